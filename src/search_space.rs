//! Search space intersection across completed trials.

use std::collections::BTreeMap;

use crate::distribution::Distribution;
use crate::trial::FrozenTrial;

/// Named distributions, iterated in lexicographic name order.
///
/// The ordering is what gives backend point vectors a stable positional
/// meaning, so it must stay a sorted map.
pub type SearchSpace = BTreeMap<String, Distribution>;

/// Computes the intersection of search spaces across completed trials.
///
/// Trials may sample different parameter sets (conditional parameters) or
/// change a parameter's bounds between runs. Only parameters that every
/// completed trial recorded, with an identical distribution, can be modeled
/// jointly.
///
/// # Examples
///
/// ```
/// use optimizer_bo::distribution::Distribution;
/// use optimizer_bo::param::ParamValue;
/// use optimizer_bo::search_space::IntersectionSearchSpace;
/// use optimizer_bo::FrozenTrial;
///
/// let x = Distribution::uniform(0.0, 1.0).unwrap();
/// let y = Distribution::int_uniform(0, 5).unwrap();
///
/// let trials = vec![
///     FrozenTrial::completed(0, 1.0)
///         .with_param("x", x.clone(), ParamValue::Float(0.5))
///         .with_param("y", y.clone(), ParamValue::Int(2)),
///     // No "y" in this trial.
///     FrozenTrial::completed(1, 0.5).with_param("x", x.clone(), ParamValue::Float(0.7)),
/// ];
///
/// let space = IntersectionSearchSpace::calculate(&trials);
/// assert!(space.contains_key("x"));
/// assert!(!space.contains_key("y"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IntersectionSearchSpace;

impl IntersectionSearchSpace {
    /// Calculates the intersection over the completed trials in `trials`.
    ///
    /// Running, pruned and failed trials are ignored. Returns an empty space
    /// when nothing has completed.
    #[must_use]
    pub fn calculate(trials: &[FrozenTrial]) -> SearchSpace {
        let mut completed = trials.iter().filter(|t| t.is_complete());

        let Some(first) = completed.next() else {
            return SearchSpace::new();
        };

        let mut space: SearchSpace = first
            .distributions
            .iter()
            .map(|(name, d)| (name.clone(), d.clone()))
            .collect();

        for trial in completed {
            space.retain(|name, d| trial.distributions.get(name) == Some(d));
            if space.is_empty() {
                break;
            }
        }

        space
    }
}
