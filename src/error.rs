/// Errors returned by samplers, the space converter and backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a backend fails its availability probe.
    ///
    /// Raised once, when the sampler is built, never in the middle of a study.
    #[error("backend `{backend}` is not available: {reason}")]
    BackendUnavailable {
        /// Name of the backend that failed to load.
        backend: String,
        /// The underlying load error.
        reason: String,
    },

    /// Returned when a search-space parameter has no backend dimension mapping.
    #[error("distribution `{kind}` of parameter '{name}' is not supported by the backend")]
    UnsupportedDistribution {
        /// The parameter name.
        name: String,
        /// The distribution kind as reported by [`Distribution::kind`](crate::distribution::Distribution::kind).
        kind: String,
    },

    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds: low must be positive for log scale")]
    InvalidLogBounds,

    /// Returned when step size is not positive.
    #[error("invalid step: step must be positive")]
    InvalidStep,

    /// Returned when categorical choices are empty.
    #[error("categorical choices cannot be empty")]
    EmptyChoices,

    /// Returned when a backend point does not match the number of dimensions.
    #[error("dimension mismatch: expected {expected} values but the point has {got}")]
    DimensionMismatch {
        /// The expected number of dimensions.
        expected: usize,
        /// The actual number of values in the point.
        got: usize,
    },

    /// Returned when a backend value cannot be decoded for its dimension.
    #[error("invalid backend value for parameter '{name}': {reason}")]
    InvalidBackendValue {
        /// The parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Returned when a backend option is malformed or unknown.
    #[error("invalid backend option '{key}': {reason}")]
    InvalidOption {
        /// The option key.
        key: String,
        /// Why the option was rejected.
        reason: String,
    },

    /// Returned when the backend fails while ingesting or proposing points.
    #[error("backend error: {0}")]
    Backend(String),

    /// Returned when requesting the best trial but no trials have completed.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// Returned when a trial number is not known to the study.
    #[error("unknown trial #{0}")]
    UnknownTrial(u64),

    /// Returned when a trial that already finished is told a result again.
    #[error("trial #{0} has already finished")]
    TrialAlreadyFinished(u64),

    /// Returned by objective functions to mark a trial as failed.
    #[error("objective failed: {0}")]
    Objective(String),
}

/// A convenience type alias for `Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_backend_value(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidBackendValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
