//! Trial records as seen by samplers.

use std::collections::HashMap;

use crate::distribution::Distribution;
use crate::param::ParamValue;
use crate::types::TrialState;

/// A snapshot of one trial: its state, parameters and objective value.
///
/// Samplers only ever read these; the study owns the live copies.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrozenTrial {
    /// Sequential trial number within the study.
    pub number: u64,
    /// Lifecycle state.
    pub state: TrialState,
    /// Sampled parameter values in external form, keyed by name.
    pub params: HashMap<String, ParamValue>,
    /// The distribution each parameter was sampled from, keyed by name.
    pub distributions: HashMap<String, Distribution>,
    /// The objective value, present once the trial completed.
    pub value: Option<f64>,
}

impl FrozenTrial {
    /// Creates a running trial without parameters.
    #[must_use]
    pub fn new(number: u64) -> Self {
        Self {
            number,
            state: TrialState::Running,
            params: HashMap::new(),
            distributions: HashMap::new(),
            value: None,
        }
    }

    /// Creates a completed trial with objective `value` and no parameters yet.
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_bo::distribution::Distribution;
    /// use optimizer_bo::param::ParamValue;
    /// use optimizer_bo::FrozenTrial;
    ///
    /// let trial = FrozenTrial::completed(0, 1.5)
    ///     .with_param("x", Distribution::uniform(0.0, 1.0).unwrap(), ParamValue::Float(0.3));
    /// assert_eq!(trial.params["x"], ParamValue::Float(0.3));
    /// ```
    #[must_use]
    pub fn completed(number: u64, value: f64) -> Self {
        Self {
            state: TrialState::Complete,
            value: Some(value),
            ..Self::new(number)
        }
    }

    /// Records a parameter together with its distribution.
    #[must_use]
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        distribution: Distribution,
        value: ParamValue,
    ) -> Self {
        self.set_param(name, distribution, value);
        self
    }

    /// Records a parameter together with its distribution.
    pub fn set_param(
        &mut self,
        name: impl Into<String>,
        distribution: Distribution,
        value: ParamValue,
    ) {
        let name = name.into();
        self.distributions.insert(name.clone(), distribution);
        self.params.insert(name, value);
    }

    /// Returns `true` if the trial completed with an objective value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == TrialState::Complete
    }
}
