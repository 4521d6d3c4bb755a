//! Conversion between a named search space and backend points.
//!
//! A [`SpaceConverter`] lives for exactly one relative-sampling call: it is
//! built from the joint search space, replays the completed history into the
//! backend, proposes one point and is dropped. Dimensions are laid out in
//! lexicographic parameter order (the iteration order of [`SearchSpace`]),
//! which is the positional contract of every [`Point`] exchanged with the
//! backend.
//!
//! | Distribution | Backend dimension | Point value |
//! |--------------|-------------------|-------------|
//! | `Uniform{low, high}` | `Real[low, next_down(high)]` | the value |
//! | `LogUniform{low, high}` | `Real[low, next_down(high)]`, log prior | the value |
//! | `IntUniform{low, high}` | `Integer[low, high]` | the value |
//! | `DiscreteUniform{low, high, q}` | `Integer[0, count]` | `(v - low) / q` |
//! | `Categorical{choices}` | `Categorical(choices)` | the choice |

use std::collections::BTreeMap;

use crate::backend::{
    Backend, BackendOptimizer, BackendOptions, BackendValue, Dimension, Point, Prior,
};
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::search_space::SearchSpace;
use crate::study::StudyHistory;
use crate::trial::FrozenTrial;
use crate::types::Direction;

/// Outcome of [`SpaceConverter::replay`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Completed trials fed to the backend.
    pub observed: usize,
    /// Completed trials left out because they do not fit the current space.
    pub excluded: usize,
}

/// Maps one distribution to its backend dimension.
///
/// The upper bound of continuous distributions is exclusive while backend
/// intervals are closed, so it is moved down to the next representable
/// `f64` (never below `low`).
///
/// # Errors
///
/// Returns [`Error::UnsupportedDistribution`] for custom distributions.
pub fn to_dimension(name: &str, distribution: &Distribution) -> Result<Dimension> {
    let dimension = match distribution {
        Distribution::Uniform(d) => Dimension::Real {
            low: d.low,
            high: exclusive_upper(d.low, d.high),
            prior: Prior::Uniform,
        },
        Distribution::LogUniform(d) => Dimension::Real {
            low: d.low,
            high: exclusive_upper(d.low, d.high),
            prior: Prior::LogUniform,
        },
        Distribution::IntUniform(d) => Dimension::Integer {
            low: d.low,
            high: d.high,
        },
        Distribution::DiscreteUniform(d) => Dimension::Integer {
            low: 0,
            high: d.count(),
        },
        Distribution::Categorical(d) => Dimension::Categorical {
            categories: d.choices.clone(),
        },
        Distribution::Custom(d) => {
            return Err(Error::UnsupportedDistribution {
                name: name.to_string(),
                kind: d.kind().to_string(),
            });
        }
    };
    Ok(dimension)
}

/// Maps a whole search space to backend dimensions, in name order.
///
/// # Errors
///
/// Returns [`Error::UnsupportedDistribution`] if any parameter has no mapping.
pub fn build_dimensions(space: &SearchSpace) -> Result<Vec<Dimension>> {
    space
        .iter()
        .map(|(name, distribution)| to_dimension(name, distribution))
        .collect()
}

fn exclusive_upper(low: f64, high: f64) -> f64 {
    high.next_down().max(low)
}

/// Owns one backend optimizer and the search space it was built for.
pub struct SpaceConverter {
    search_space: SearchSpace,
    dimensions: Vec<Dimension>,
    optimizer: Box<dyn BackendOptimizer>,
}

impl core::fmt::Debug for SpaceConverter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpaceConverter")
            .field("search_space", &self.search_space)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl SpaceConverter {
    /// Builds the dimensions for `search_space` and constructs a backend optimizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDistribution`] before touching the backend
    /// if a parameter cannot be represented, or the backend's construction error.
    pub fn new(
        search_space: SearchSpace,
        backend: &dyn Backend,
        options: &BackendOptions,
    ) -> Result<Self> {
        let dimensions = build_dimensions(&search_space)?;
        let optimizer = backend.construct(dimensions.clone(), options)?;
        Ok(Self {
            search_space,
            dimensions,
            optimizer,
        })
    }

    /// The search space this converter was built for.
    #[must_use]
    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// The backend dimensions, in point order.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Feeds every compatible completed trial of `study` to the backend.
    ///
    /// Objectives are negated for maximization studies. All observations are
    /// told in a single batch; nothing is told when no trial qualifies.
    ///
    /// # Errors
    ///
    /// Propagates the backend's `tell` error.
    pub fn replay(&mut self, study: &dyn StudyHistory) -> Result<ReplayReport> {
        let direction = study.direction();
        let mut report = ReplayReport::default();
        let mut points = Vec::new();
        let mut objectives = Vec::new();

        for trial in study.trials().iter().filter(|t| t.is_complete()) {
            match self.observation(trial, direction) {
                Some((point, objective)) => {
                    points.push(point);
                    objectives.push(objective);
                    report.observed += 1;
                }
                None => report.excluded += 1,
            }
        }

        if !points.is_empty() {
            self.optimizer.tell(points, objectives)?;
        }
        Ok(report)
    }

    /// Returns `true` if `trial` recorded every parameter of the space with a
    /// value inside the current distribution.
    ///
    /// In a single process the joint space is computed from the same trials
    /// that are replayed, so this always holds. With several workers sharing a
    /// history, a trial may complete against a different space right after
    /// this worker computed its own.
    #[must_use]
    pub fn is_compatible(&self, trial: &FrozenTrial) -> bool {
        self.search_space.iter().all(|(name, distribution)| {
            trial
                .params
                .get(name)
                .and_then(|value| distribution.to_internal(value))
                .is_some_and(|internal| distribution.contains(internal))
        })
    }

    /// Asks the backend for one point and decodes it into named values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the point has the wrong length
    /// and [`Error::InvalidBackendValue`] if a value does not fit its dimension.
    pub fn propose(mut self) -> Result<BTreeMap<String, ParamValue>> {
        let point = self.optimizer.ask()?;
        if point.len() != self.dimensions.len() {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions.len(),
                got: point.len(),
            });
        }

        self.search_space
            .iter()
            .zip(&self.dimensions)
            .zip(point)
            .map(|(((name, distribution), dimension), value)| {
                if !dimension.contains(&value) {
                    return Err(Error::invalid_backend_value(
                        name,
                        format!("{value:?} is outside {dimension:?}"),
                    ));
                }
                decode(name, distribution, value).map(|v| (name.clone(), v))
            })
            .collect()
    }

    fn observation(&self, trial: &FrozenTrial, direction: Direction) -> Option<(Point, f64)> {
        let value = trial.value.filter(|v| v.is_finite())?;
        if !self.is_compatible(trial) {
            return None;
        }
        let point = self
            .search_space
            .iter()
            .map(|(name, distribution)| encode(distribution, trial.params.get(name)?))
            .collect::<Option<Point>>()?;
        Some((point, direction.to_minimization(value)))
    }
}

/// Encodes an external value as a backend coordinate.
fn encode(distribution: &Distribution, value: &ParamValue) -> Option<BackendValue> {
    match (distribution, value) {
        (Distribution::Uniform(_) | Distribution::LogUniform(_), ParamValue::Float(v)) => {
            Some(BackendValue::Real(*v))
        }
        (Distribution::IntUniform(_), ParamValue::Int(v)) => Some(BackendValue::Integer(*v)),
        (Distribution::DiscreteUniform(d), ParamValue::Float(v)) => {
            Some(BackendValue::Integer(d.index_of(*v)))
        }
        (Distribution::Categorical(_), ParamValue::Choice(c)) => {
            Some(BackendValue::Category(c.clone()))
        }
        _ => None,
    }
}

/// Decodes a backend coordinate into the distribution's external form.
#[allow(clippy::cast_precision_loss)]
fn decode(name: &str, distribution: &Distribution, value: BackendValue) -> Result<ParamValue> {
    let internal = match (distribution, &value) {
        (Distribution::Uniform(_) | Distribution::LogUniform(_), BackendValue::Real(v)) => *v,
        (Distribution::IntUniform(_), BackendValue::Integer(v)) => *v as f64,
        (Distribution::DiscreteUniform(d), BackendValue::Integer(k)) => d.value_at(*k),
        (Distribution::Categorical(d), BackendValue::Category(c)) => {
            let index = d.index_of(c).ok_or_else(|| {
                Error::invalid_backend_value(name, format!("unknown category {c}"))
            })?;
            index as f64
        }
        (Distribution::Custom(d), _) => {
            return Err(Error::UnsupportedDistribution {
                name: name.to_string(),
                kind: d.kind().to_string(),
            });
        }
        _ => {
            return Err(Error::invalid_backend_value(
                name,
                format!("{value:?} does not match a {} distribution", distribution.kind()),
            ));
        }
    };

    distribution.to_external(internal).ok_or_else(|| {
        Error::invalid_backend_value(name, format!("{internal} has no external value"))
    })
}
