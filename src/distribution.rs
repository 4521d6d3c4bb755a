//! Parameter distribution types.
//!
//! Every distribution has an *external* representation (the [`ParamValue`] an
//! objective sees) and an *internal* one (`f64`). Categorical values are
//! internally represented by the index of the choice.

use core::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::param::{ChoiceValue, ParamValue};

/// Tolerance used when checking that a value lies on a step grid.
const GRID_TOLERANCE: f64 = 1e-8;

/// Continuous distribution over `[low, high)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UniformDistribution {
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (exclusive unless equal to `low`).
    pub high: f64,
}

/// Continuous distribution over `[low, high)`, sampled in log space.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogUniformDistribution {
    /// Lower bound (inclusive, positive).
    pub low: f64,
    /// Upper bound (exclusive unless equal to `low`).
    pub high: f64,
}

/// Integer distribution over `[low, high]`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntUniformDistribution {
    /// Lower bound (inclusive).
    pub low: i64,
    /// Upper bound (inclusive).
    pub high: i64,
}

/// Stepped distribution over `low, low + q, low + 2q, ...` up to `high`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscreteUniformDistribution {
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (inclusive when on the grid).
    pub high: f64,
    /// Step size.
    pub q: f64,
}

impl DiscreteUniformDistribution {
    /// Returns the index of the largest grid point, i.e. `floor((high - low) / q)`.
    ///
    /// Ratios within floating-point noise of an integer snap to that integer,
    /// so `high` stays reachable for steps such as `0.1`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn count(&self) -> i64 {
        let ratio = (self.high - self.low) / self.q;
        let rounded = ratio.round();
        if (ratio - rounded).abs() < GRID_TOLERANCE {
            rounded as i64
        } else {
            ratio.floor() as i64
        }
    }

    /// Maps an on-grid value to its step index.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_of(&self, value: f64) -> i64 {
        ((value - self.low) / self.q).round() as i64
    }

    /// Maps a step index back to its value, never above `high`.
    ///
    /// When `count()` snapped up to the next grid point, the top index maps
    /// to `high` itself.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value_at(&self, index: i64) -> f64 {
        (index as f64 * self.q + self.low).min(self.high)
    }
}

/// Categorical distribution over an ordered list of choices.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoricalDistribution {
    /// The available choices, in order.
    pub choices: Vec<ChoiceValue>,
}

impl CategoricalDistribution {
    /// Returns the position of `choice`, if present.
    #[must_use]
    pub fn index_of(&self, choice: &ChoiceValue) -> Option<usize> {
        self.choices.iter().position(|c| c == choice)
    }
}

/// A user-defined distribution kind.
///
/// Custom distributions can be sampled by independent samplers but have no
/// backend representation; putting one into a relative search space is an
/// [`Error::UnsupportedDistribution`].
pub trait CustomDistribution: fmt::Debug + Send + Sync {
    /// Short name of the distribution kind.
    fn kind(&self) -> &str;

    /// Returns `true` if `internal` is a valid internal value.
    fn contains(&self, internal: f64) -> bool;

    /// Converts an external value into its internal representation.
    fn to_internal(&self, value: &ParamValue) -> Option<f64>;

    /// Converts an internal value back into its external representation.
    fn to_external(&self, internal: f64) -> Option<ParamValue>;

    /// Returns `true` if the distribution has exactly one value.
    fn is_single(&self) -> bool;

    /// Draws a value given `u`, uniform in `[0, 1)`.
    fn sample(&self, u: f64) -> ParamValue;
}

/// Enum wrapping all parameter distribution types.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Distribution {
    /// A continuous distribution.
    Uniform(UniformDistribution),
    /// A continuous distribution sampled in log space.
    LogUniform(LogUniformDistribution),
    /// An integer distribution.
    IntUniform(IntUniformDistribution),
    /// A stepped floating-point distribution.
    DiscreteUniform(DiscreteUniformDistribution),
    /// A categorical distribution.
    Categorical(CategoricalDistribution),
    /// A user-defined distribution.
    #[cfg_attr(feature = "serde", serde(skip))]
    Custom(Arc<dyn CustomDistribution>),
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uniform(a), Self::Uniform(b)) => a == b,
            (Self::LogUniform(a), Self::LogUniform(b)) => a == b,
            (Self::IntUniform(a), Self::IntUniform(b)) => a == b,
            (Self::DiscreteUniform(a), Self::DiscreteUniform(b)) => a == b,
            (Self::Categorical(a), Self::Categorical(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn check_bounds(low: f64, high: f64) -> Result<()> {
    if low > high || low.is_nan() || high.is_nan() {
        return Err(Error::InvalidBounds { low, high });
    }
    Ok(())
}

/// `[low, high)`, or exactly `low` when the interval is degenerate.
fn half_open_contains(low: f64, high: f64, value: f64) -> bool {
    if low == high {
        value == low
    } else {
        low <= value && value < high
    }
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

impl Distribution {
    /// Creates a continuous distribution over `[low, high)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high`.
    pub fn uniform(low: f64, high: f64) -> Result<Self> {
        check_bounds(low, high)?;
        Ok(Self::Uniform(UniformDistribution { low, high }))
    }

    /// Creates a log-scale continuous distribution over `[low, high)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` and
    /// [`Error::InvalidLogBounds`] if `low` is not positive.
    pub fn log_uniform(low: f64, high: f64) -> Result<Self> {
        check_bounds(low, high)?;
        if low <= 0.0 {
            return Err(Error::InvalidLogBounds);
        }
        Ok(Self::LogUniform(LogUniformDistribution { low, high }))
    }

    /// Creates an integer distribution over `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high`.
    #[allow(clippy::cast_precision_loss)]
    pub fn int_uniform(low: i64, high: i64) -> Result<Self> {
        if low > high {
            return Err(Error::InvalidBounds {
                low: low as f64,
                high: high as f64,
            });
        }
        Ok(Self::IntUniform(IntUniformDistribution { low, high }))
    }

    /// Creates a stepped distribution over `low, low + q, ...` up to `high`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` and
    /// [`Error::InvalidStep`] if `q` is not positive.
    pub fn discrete_uniform(low: f64, high: f64, q: f64) -> Result<Self> {
        check_bounds(low, high)?;
        if q <= 0.0 || !q.is_finite() {
            return Err(Error::InvalidStep);
        }
        Ok(Self::DiscreteUniform(DiscreteUniformDistribution {
            low,
            high,
            q,
        }))
    }

    /// Creates a categorical distribution over `choices`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] if `choices` is empty.
    pub fn categorical<I, C>(choices: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<ChoiceValue>,
    {
        let choices: Vec<ChoiceValue> = choices.into_iter().map(Into::into).collect();
        if choices.is_empty() {
            return Err(Error::EmptyChoices);
        }
        Ok(Self::Categorical(CategoricalDistribution { choices }))
    }

    /// Wraps a user-defined distribution.
    pub fn custom(distribution: impl CustomDistribution + 'static) -> Self {
        Self::Custom(Arc::new(distribution))
    }

    /// Short name of the distribution kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Uniform(_) => "uniform",
            Self::LogUniform(_) => "log_uniform",
            Self::IntUniform(_) => "int_uniform",
            Self::DiscreteUniform(_) => "discrete_uniform",
            Self::Categorical(_) => "categorical",
            Self::Custom(d) => d.kind(),
        }
    }

    /// Returns `true` for categorical distributions.
    #[must_use]
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical(_))
    }

    /// Returns `true` if the distribution can produce exactly one value.
    #[must_use]
    pub fn is_single(&self) -> bool {
        match self {
            Self::Uniform(d) => d.low == d.high,
            Self::LogUniform(d) => d.low == d.high,
            Self::IntUniform(d) => d.low == d.high,
            Self::DiscreteUniform(d) => d.count() == 0,
            Self::Categorical(d) => d.choices.len() == 1,
            Self::Custom(d) => d.is_single(),
        }
    }

    /// Returns `true` if `internal` is a valid internal value of this distribution.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn contains(&self, internal: f64) -> bool {
        match self {
            Self::Uniform(d) => half_open_contains(d.low, d.high, internal),
            Self::LogUniform(d) => half_open_contains(d.low, d.high, internal),
            Self::IntUniform(d) => {
                is_integral(internal) && d.low as f64 <= internal && internal <= d.high as f64
            }
            Self::DiscreteUniform(d) => {
                if !(d.low <= internal && internal <= d.high + GRID_TOLERANCE * d.q) {
                    return false;
                }
                let k = (internal - d.low) / d.q;
                (k - k.round()).abs() < GRID_TOLERANCE
            }
            Self::Categorical(d) => {
                is_integral(internal) && internal >= 0.0 && internal < d.choices.len() as f64
            }
            Self::Custom(d) => d.contains(internal),
        }
    }

    /// Converts an external value into its internal representation.
    ///
    /// Returns `None` if the value's type does not belong to this distribution
    /// or, for categorical distributions, if it is not one of the choices.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_internal(&self, value: &ParamValue) -> Option<f64> {
        match (self, value) {
            (Self::Uniform(_) | Self::LogUniform(_) | Self::DiscreteUniform(_), ParamValue::Float(v)) => {
                Some(*v)
            }
            (Self::IntUniform(_), ParamValue::Int(v)) => Some(*v as f64),
            (Self::Categorical(d), ParamValue::Choice(c)) => d.index_of(c).map(|i| i as f64),
            (Self::Custom(d), v) => d.to_internal(v),
            _ => None,
        }
    }

    /// Converts an internal value back into its external representation.
    ///
    /// Returns `None` for categorical indices outside the choice list.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn to_external(&self, internal: f64) -> Option<ParamValue> {
        match self {
            Self::Uniform(_) | Self::LogUniform(_) | Self::DiscreteUniform(_) => {
                Some(ParamValue::Float(internal))
            }
            Self::IntUniform(_) => Some(ParamValue::Int(internal.round() as i64)),
            Self::Categorical(d) => {
                if !is_integral(internal) || internal < 0.0 {
                    return None;
                }
                d.choices
                    .get(internal as usize)
                    .cloned()
                    .map(ParamValue::Choice)
            }
            Self::Custom(d) => d.to_external(internal),
        }
    }
}
