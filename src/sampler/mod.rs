//! Sampler trait and implementations for parameter sampling.

pub mod bo;
pub mod random;

use std::collections::BTreeMap;

use crate::distribution::Distribution;
use crate::error::Result;
use crate::param::ParamValue;
use crate::search_space::SearchSpace;
use crate::study::StudyHistory;
use crate::trial::FrozenTrial;

pub use bo::{BoSampler, BoSamplerBuilder};
pub use random::RandomSampler;

/// Trait for pluggable parameter sampling strategies.
///
/// A study asks its sampler in two phases for each trial:
///
/// 1. **Relative**: [`infer_relative_search_space`](Self::infer_relative_search_space)
///    picks the parameters to sample jointly and
///    [`sample_relative`](Self::sample_relative) proposes values for all of
///    them at once.
/// 2. **Independent**: every parameter not covered by the relative proposal is
///    drawn on its own through [`sample_independent`](Self::sample_independent).
///
/// The trait requires `Send + Sync` so a sampler can be shared between
/// studies and workers.
pub trait Sampler: Send + Sync {
    /// Returns the search space to sample jointly for `trial`.
    ///
    /// The default samples nothing jointly.
    fn infer_relative_search_space(
        &self,
        _study: &dyn StudyHistory,
        _trial: &FrozenTrial,
    ) -> SearchSpace {
        SearchSpace::new()
    }

    /// Proposes values for every parameter of `search_space` at once.
    ///
    /// The default proposes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the joint proposal cannot be produced.
    fn sample_relative(
        &self,
        _study: &dyn StudyHistory,
        _trial: &FrozenTrial,
        _search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, ParamValue>> {
        Ok(BTreeMap::new())
    }

    /// Draws a value for a single parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the distribution cannot be sampled.
    fn sample_independent(
        &self,
        study: &dyn StudyHistory,
        trial: &FrozenTrial,
        name: &str,
        distribution: &Distribution,
    ) -> Result<ParamValue>;
}
