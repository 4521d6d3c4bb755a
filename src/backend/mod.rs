//! Backend optimizer interface.
//!
//! A backend is an opaque minimizer over a box of [`Dimension`]s. It is
//! constructed once per relative-sampling call, told the full observation
//! history in a single batch, and asked for one point.

#[cfg(test)]
pub(crate) mod fake;
pub mod gp;
#[cfg(feature = "gp")]
mod surrogate;

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::param::ChoiceValue;

pub use gp::GpBackend;

/// Option key that names the search dimensions.
///
/// Dimensions are always derived from the search space, so this key is
/// stripped from user-supplied [`BackendOptions`].
pub const DIMENSIONS_KEY: &str = "dimensions";

/// Prior used to draw values of a real dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prior {
    /// Uniform over `[low, high]`.
    Uniform,
    /// Uniform over `[ln low, ln high]`.
    LogUniform,
}

/// One axis of the backend's search box.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dimension {
    /// A closed real interval.
    Real {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive).
        high: f64,
        /// Sampling prior.
        prior: Prior,
    },
    /// A closed integer interval.
    Integer {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
    },
    /// A finite set of literal categories.
    Categorical {
        /// The categories, in order.
        categories: Vec<ChoiceValue>,
    },
}

impl Dimension {
    /// Returns `true` if `value` has the right variant and lies inside the dimension.
    #[must_use]
    pub fn contains(&self, value: &BackendValue) -> bool {
        match (self, value) {
            (Self::Real { low, high, .. }, BackendValue::Real(v)) => low <= v && v <= high,
            (Self::Integer { low, high }, BackendValue::Integer(v)) => low <= v && v <= high,
            (Self::Categorical { categories }, BackendValue::Category(c)) => {
                categories.contains(c)
            }
            _ => false,
        }
    }
}

/// A single coordinate of a backend point.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendValue {
    /// Coordinate of a [`Dimension::Real`].
    Real(f64),
    /// Coordinate of a [`Dimension::Integer`].
    Integer(i64),
    /// Coordinate of a [`Dimension::Categorical`].
    Category(ChoiceValue),
}

/// A point in the backend's search box, one value per dimension, in order.
pub type Point = Vec<BackendValue>;

/// A value of a backend option.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptionValue {
    /// A boolean flag.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(String),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Options forwarded verbatim to [`Backend::construct`].
///
/// # Examples
///
/// ```
/// use optimizer_bo::backend::BackendOptions;
///
/// let options = BackendOptions::new()
///     .with("n_initial_points", 5)
///     .with("acq_func", "EI");
/// assert_eq!(options.get_usize("n_initial_points").unwrap(), Some(5));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackendOptions {
    values: BTreeMap<String, OptionValue>,
}

impl BackendOptions {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.values.remove(key)
    }

    /// Returns the raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// Returns `true` if `key` is set.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterates over the option keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns `true` if no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads `key` as a float; integers are widened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not numeric.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(OptionValue::Float(v)) => Ok(Some(*v)),
            Some(OptionValue::Int(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(Error::invalid_option(
                key,
                format!("expected a number, got {other:?}"),
            )),
        }
    }

    /// Reads `key` as a non-negative integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not a non-negative integer.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(OptionValue::Int(v)) => u64::try_from(*v)
                .map(Some)
                .map_err(|_| Error::invalid_option(key, "must be non-negative")),
            Some(other) => Err(Error::invalid_option(
                key,
                format!("expected an integer, got {other:?}"),
            )),
        }
    }

    /// Reads `key` as a count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not a non-negative integer.
    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get_u64(key)?
            .map(|v| usize::try_from(v).map_err(|_| Error::invalid_option(key, "out of range")))
            .transpose()
    }

    /// Reads `key` as a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not a string.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(OptionValue::Str(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(Error::invalid_option(
                key,
                format!("expected a string, got {other:?}"),
            )),
        }
    }
}

/// A Bayesian-optimization backend: a factory for [`BackendOptimizer`]s.
pub trait Backend: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Checks that the backend can be used.
    ///
    /// Called once when a sampler is built; the `Err` payload is the
    /// underlying load error.
    ///
    /// # Errors
    ///
    /// Returns a description of why the backend cannot run.
    fn probe(&self) -> core::result::Result<(), String>;

    /// Creates an optimizer over `dimensions`.
    ///
    /// # Errors
    ///
    /// Returns an error if `options` are rejected or the optimizer cannot be created.
    fn construct(
        &self,
        dimensions: Vec<Dimension>,
        options: &BackendOptions,
    ) -> Result<Box<dyn BackendOptimizer>>;
}

/// A constructed optimizer: ingests observations, proposes points.
pub trait BackendOptimizer {
    /// Ingests a batch of observations. `objectives` are minimized.
    ///
    /// # Errors
    ///
    /// Returns an error if a point does not fit the dimensions.
    fn tell(&mut self, points: Vec<Point>, objectives: Vec<f64>) -> Result<()>;

    /// Proposes the next point to evaluate.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot produce a point.
    fn ask(&mut self) -> Result<Point>;
}
