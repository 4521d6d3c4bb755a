//! Built-in Gaussian-process backend.
//!
//! The backend keeps every observation it is told, encodes points into the
//! unit cube (log-prior reals in log space, categoricals one-hot), fits a
//! Matérn 5/2 GP to the most recent observations and proposes the best of a
//! batch of random candidates under the configured acquisition function.
//!
//! Until `n_initial_points` observations exist, or when the kernel matrix
//! cannot be factorized, it proposes a uniformly random point instead.
//!
//! # Options
//!
//! | Key                | Type   | Default |
//! |--------------------|--------|---------|
//! | `n_initial_points` | int    | 10      |
//! | `n_candidates`     | int    | 1000    |
//! | `noise_variance`   | float  | 1e-6    |
//! | `acq_func`         | string | `"EI"` (`"EI"`, `"PI"` or `"LCB"`) |
//! | `xi`               | float  | 0.01    |
//! | `kappa`            | float  | 1.96    |
//! | `random_state`     | int    | unset   |
//!
//! Any other key is rejected with [`Error::InvalidOption`].

use crate::backend::{Backend, BackendOptimizer, BackendOptions, Dimension, Prior};
use crate::error::{Error, Result};

#[cfg(feature = "gp")]
use crate::backend::{BackendValue, Point, surrogate};
#[cfg(feature = "gp")]
use crate::rng_util;

/// Observations used for fitting are capped to keep the O(n³) fit bounded.
#[cfg(feature = "gp")]
const MAX_TRAIN_POINTS: usize = 100;

const KNOWN_OPTIONS: [&str; 7] = [
    "n_initial_points",
    "n_candidates",
    "noise_variance",
    "acq_func",
    "xi",
    "kappa",
    "random_state",
];

/// Acquisition function used to rank candidate points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Acquisition {
    /// Expected improvement over the incumbent, minus the margin `xi`.
    ExpectedImprovement {
        /// Exploration margin.
        xi: f64,
    },
    /// Probability of improving on the incumbent by at least `xi`.
    ProbabilityOfImprovement {
        /// Exploration margin.
        xi: f64,
    },
    /// Lower confidence bound `mean - kappa * std`.
    LowerConfidenceBound {
        /// Exploration weight.
        kappa: f64,
    },
}

/// Validated configuration of a [`GpBackend`] optimizer.
#[derive(Clone, Debug, PartialEq)]
pub struct GpConfig {
    /// Observations required before the GP is used.
    pub n_initial_points: usize,
    /// Random candidates scored per proposal.
    pub n_candidates: usize,
    /// Noise variance added to the kernel diagonal.
    pub noise_variance: f64,
    /// Acquisition function.
    pub acquisition: Acquisition,
    /// Seed for candidate generation. Unset means entropy-seeded.
    pub random_state: Option<u64>,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            n_initial_points: 10,
            n_candidates: 1000,
            noise_variance: 1e-6,
            acquisition: Acquisition::ExpectedImprovement { xi: 0.01 },
            random_state: None,
        }
    }
}

impl GpConfig {
    /// Parses backend options into a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for unknown keys, values of the wrong
    /// type, a non-positive `n_candidates`, a negative or non-finite
    /// `noise_variance` or an unknown `acq_func`.
    pub fn from_options(options: &BackendOptions) -> Result<Self> {
        if let Some(key) = options.keys().find(|key| !KNOWN_OPTIONS.contains(key)) {
            return Err(Error::invalid_option(key, "unknown option for backend `gp`"));
        }

        let defaults = Self::default();

        let n_candidates = options
            .get_usize("n_candidates")?
            .unwrap_or(defaults.n_candidates);
        if n_candidates == 0 {
            return Err(Error::invalid_option("n_candidates", "must be at least 1"));
        }

        let noise_variance = options
            .get_f64("noise_variance")?
            .unwrap_or(defaults.noise_variance);
        if !noise_variance.is_finite() || noise_variance < 0.0 {
            return Err(Error::invalid_option(
                "noise_variance",
                "must be finite and non-negative",
            ));
        }

        let xi = options.get_f64("xi")?.unwrap_or(0.01);
        let kappa = options.get_f64("kappa")?.unwrap_or(1.96);
        let acquisition = match options.get_str("acq_func")?.unwrap_or("EI") {
            "EI" => Acquisition::ExpectedImprovement { xi },
            "PI" => Acquisition::ProbabilityOfImprovement { xi },
            "LCB" => Acquisition::LowerConfidenceBound { kappa },
            other => {
                return Err(Error::invalid_option(
                    "acq_func",
                    format!("expected one of EI, PI, LCB, got {other:?}"),
                ));
            }
        };

        Ok(Self {
            n_initial_points: options
                .get_usize("n_initial_points")?
                .unwrap_or(defaults.n_initial_points),
            n_candidates,
            noise_variance,
            acquisition,
            random_state: options.get_u64("random_state")?,
        })
    }
}

/// Gaussian-process backend.
///
/// Requires the `gp` feature; without it [`Backend::probe`] fails and any
/// sampler built on it reports [`Error::BackendUnavailable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GpBackend;

impl GpBackend {
    /// Creates the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Backend for GpBackend {
    fn name(&self) -> &str {
        "gp"
    }

    fn probe(&self) -> core::result::Result<(), String> {
        if cfg!(feature = "gp") {
            Ok(())
        } else {
            Err("optimizer-bo was built without the `gp` feature".to_string())
        }
    }

    fn construct(
        &self,
        dimensions: Vec<Dimension>,
        options: &BackendOptions,
    ) -> Result<Box<dyn BackendOptimizer>> {
        let config = GpConfig::from_options(options)?;
        for dimension in &dimensions {
            validate(dimension)?;
        }
        build_optimizer(dimensions, config)
    }
}

#[allow(clippy::cast_precision_loss)]
fn validate(dimension: &Dimension) -> Result<()> {
    match dimension {
        Dimension::Real { low, high, prior } => {
            if low.is_nan() || high.is_nan() || low > high {
                return Err(Error::InvalidBounds {
                    low: *low,
                    high: *high,
                });
            }
            if *prior == Prior::LogUniform && *low <= 0.0 {
                return Err(Error::InvalidLogBounds);
            }
        }
        Dimension::Integer { low, high } => {
            if low > high {
                return Err(Error::InvalidBounds {
                    low: *low as f64,
                    high: *high as f64,
                });
            }
        }
        Dimension::Categorical { categories } => {
            if categories.is_empty() {
                return Err(Error::EmptyChoices);
            }
        }
    }
    Ok(())
}

#[cfg(feature = "gp")]
#[allow(clippy::unnecessary_wraps)]
fn build_optimizer(
    dimensions: Vec<Dimension>,
    config: GpConfig,
) -> Result<Box<dyn BackendOptimizer>> {
    Ok(Box::new(GpOptimizer {
        dimensions,
        config,
        points: Vec::new(),
        objectives: Vec::new(),
    }))
}

#[cfg(not(feature = "gp"))]
#[allow(clippy::needless_pass_by_value)]
fn build_optimizer(
    _dimensions: Vec<Dimension>,
    _config: GpConfig,
) -> Result<Box<dyn BackendOptimizer>> {
    Err(Error::Backend(
        "the `gp` feature is required to construct a GP optimizer".to_string(),
    ))
}

#[cfg(feature = "gp")]
struct GpOptimizer {
    dimensions: Vec<Dimension>,
    config: GpConfig,
    points: Vec<Point>,
    objectives: Vec<f64>,
}

#[cfg(feature = "gp")]
impl GpOptimizer {
    /// Candidate RNG. A seeded optimizer offsets the seed by the number of
    /// observations so successive proposals differ.
    fn rng(&self) -> fastrand::Rng {
        self.config.random_state.map_or_else(fastrand::Rng::new, |seed| {
            fastrand::Rng::with_seed(seed.wrapping_add(self.objectives.len() as u64))
        })
    }

    fn random_point(&self, rng: &mut fastrand::Rng) -> Point {
        self.dimensions
            .iter()
            .map(|dimension| match dimension {
                Dimension::Real {
                    low,
                    high,
                    prior: Prior::Uniform,
                } => BackendValue::Real(rng_util::f64_range(rng, *low, *high).clamp(*low, *high)),
                Dimension::Real {
                    low,
                    high,
                    prior: Prior::LogUniform,
                } => BackendValue::Real(
                    rng_util::f64_range(rng, low.ln(), high.ln())
                        .exp()
                        .clamp(*low, *high),
                ),
                Dimension::Integer { low, high } => BackendValue::Integer(rng.i64(*low..=*high)),
                Dimension::Categorical { categories } => {
                    BackendValue::Category(categories[rng.usize(0..categories.len())].clone())
                }
            })
            .collect()
    }

    /// Maps a point into the unit cube, one-hot encoding categoricals.
    #[allow(clippy::cast_precision_loss)]
    fn encode(&self, point: &[BackendValue]) -> Vec<f64> {
        let mut encoded = Vec::with_capacity(self.dimensions.len());
        for (dimension, value) in self.dimensions.iter().zip(point) {
            match (dimension, value) {
                (
                    Dimension::Real {
                        low,
                        high,
                        prior: Prior::Uniform,
                    },
                    BackendValue::Real(v),
                ) => encoded.push(unit(*v, *low, *high)),
                (
                    Dimension::Real {
                        low,
                        high,
                        prior: Prior::LogUniform,
                    },
                    BackendValue::Real(v),
                ) => encoded.push(unit(v.ln(), low.ln(), high.ln())),
                (Dimension::Integer { low, high }, BackendValue::Integer(v)) => {
                    encoded.push(unit(*v as f64, *low as f64, *high as f64));
                }
                (Dimension::Categorical { categories }, BackendValue::Category(c)) => {
                    encoded.extend(
                        categories
                            .iter()
                            .map(|category| if category == c { 1.0 } else { 0.0 }),
                    );
                }
                (Dimension::Categorical { categories }, _) => {
                    encoded.extend(core::iter::repeat_n(0.0, categories.len()));
                }
                _ => encoded.push(0.0),
            }
        }
        encoded
    }
}

/// Maps `value` from `[low, high]` to `[0, 1]`; a degenerate range maps to 0.5.
#[cfg(feature = "gp")]
fn unit(value: f64, low: f64, high: f64) -> f64 {
    let range = high - low;
    if range <= 0.0 {
        0.5
    } else {
        ((value - low) / range).clamp(0.0, 1.0)
    }
}

#[cfg(feature = "gp")]
impl BackendOptimizer for GpOptimizer {
    fn tell(&mut self, points: Vec<Point>, objectives: Vec<f64>) -> Result<()> {
        if points.len() != objectives.len() {
            return Err(Error::Backend(format!(
                "{} points but {} objective values",
                points.len(),
                objectives.len()
            )));
        }
        for point in &points {
            if point.len() != self.dimensions.len() {
                return Err(Error::DimensionMismatch {
                    expected: self.dimensions.len(),
                    got: point.len(),
                });
            }
            if !self.dimensions.iter().zip(point).all(|(d, v)| d.contains(v)) {
                return Err(Error::Backend(format!(
                    "point {point:?} lies outside the search box"
                )));
            }
        }
        if let Some(value) = objectives.iter().find(|v| !v.is_finite()) {
            return Err(Error::Backend(format!(
                "objective value {value} is not finite"
            )));
        }

        self.points.extend(points);
        self.objectives.extend(objectives);
        Ok(())
    }

    fn ask(&mut self) -> Result<Point> {
        let mut rng = self.rng();

        if self.objectives.len() < self.config.n_initial_points.max(1) {
            return Ok(self.random_point(&mut rng));
        }

        let start = self.objectives.len().saturating_sub(MAX_TRAIN_POINTS);
        let x_train: Vec<Vec<f64>> = self.points[start..]
            .iter()
            .map(|point| self.encode(point))
            .collect();
        let Some(model) = surrogate::fit(
            &x_train,
            &self.objectives[start..],
            self.config.noise_variance,
        ) else {
            trace_debug!(
                n_observations = self.objectives.len(),
                "GP fit failed, proposing a random point"
            );
            return Ok(self.random_point(&mut rng));
        };

        let acquisition = self.config.acquisition;
        let mut best_point = self.random_point(&mut rng);
        let mut best_score = model.acquisition(acquisition, &self.encode(&best_point));
        for _ in 1..self.config.n_candidates {
            let candidate = self.random_point(&mut rng);
            let score = model.acquisition(acquisition, &self.encode(&candidate));
            if score > best_score {
                best_score = score;
                best_point = candidate;
            }
        }

        Ok(best_point)
    }
}
