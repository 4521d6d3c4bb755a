//! Study history access and a minimal in-memory study.
//!
//! Samplers see a study only through [`StudyHistory`]: the optimization
//! direction and a snapshot of the trials recorded so far. [`InMemoryStudy`]
//! is the small framework that drives a [`Sampler`] through the
//! relative-then-independent protocol.

use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::sampler::Sampler;
use crate::sampler::random::RandomSampler;
use crate::search_space::SearchSpace;
use crate::trial::FrozenTrial;
use crate::types::{Direction, TrialState};

/// Read-only view of a study used by samplers.
pub trait StudyHistory {
    /// The optimization direction.
    fn direction(&self) -> Direction;

    /// A snapshot of all trials, in creation order.
    fn trials(&self) -> Vec<FrozenTrial>;
}

/// A study that keeps its trials in memory.
///
/// Trials are asked for with an explicit search space. The sampler's joint
/// (relative) proposal is used for every parameter whose distribution matches
/// the joint space; all other parameters go through
/// [`Sampler::sample_independent`].
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
///
/// use optimizer_bo::distribution::Distribution;
/// use optimizer_bo::{Direction, InMemoryStudy};
///
/// let study = InMemoryStudy::new(Direction::Minimize);
/// let mut space = BTreeMap::new();
/// space.insert("x".to_string(), Distribution::uniform(-10.0, 10.0).unwrap());
///
/// study
///     .optimize(10, &space, |trial| {
///         let x = trial.params["x"].as_f64().unwrap_or_default();
///         Ok((x - 2.0).powi(2))
///     })
///     .unwrap();
///
/// assert_eq!(study.n_trials(), 10);
/// assert!(study.best_trial().is_ok());
/// ```
pub struct InMemoryStudy {
    direction: Direction,
    sampler: Arc<dyn Sampler>,
    trials: RwLock<Vec<FrozenTrial>>,
    next_number: AtomicU64,
}

impl InMemoryStudy {
    /// Creates a study that samples uniformly at random.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self::with_sampler(direction, RandomSampler::new())
    }

    /// Creates a study driven by `sampler`.
    #[must_use]
    pub fn with_sampler(direction: Direction, sampler: impl Sampler + 'static) -> Self {
        Self::with_shared_sampler(direction, Arc::new(sampler))
    }

    /// Creates a study driven by a sampler shared with other studies.
    #[must_use]
    pub fn with_shared_sampler(direction: Direction, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            direction,
            sampler,
            trials: RwLock::new(Vec::new()),
            next_number: AtomicU64::new(0),
        }
    }

    /// Starts a new trial and samples every parameter of `space`.
    ///
    /// The returned trial is `Running`; report its outcome with
    /// [`tell`](Self::tell) or [`tell_failed`](Self::tell_failed).
    ///
    /// # Errors
    ///
    /// Propagates sampler errors. The trial is marked `Failed` in that case.
    pub fn ask(&self, space: &SearchSpace) -> Result<FrozenTrial> {
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        let trial = FrozenTrial::new(number);
        self.trials.write().push(trial.clone());

        match self.sample_params(trial, space) {
            Ok(trial) => {
                self.replace(&trial)?;
                Ok(trial)
            }
            Err(e) => {
                self.finish(number, TrialState::Failed, None)?;
                Err(e)
            }
        }
    }

    fn sample_params(&self, mut trial: FrozenTrial, space: &SearchSpace) -> Result<FrozenTrial> {
        let relative_space = self.sampler.infer_relative_search_space(self, &trial);
        let relative: BTreeMap<String, ParamValue> =
            self.sampler.sample_relative(self, &trial, &relative_space)?;

        for (name, distribution) in space {
            let value = match relative.get(name) {
                Some(value) if relative_space.get(name) == Some(distribution) => value.clone(),
                _ => self
                    .sampler
                    .sample_independent(self, &trial, name, distribution)?,
            };
            trial.set_param(name.clone(), distribution.clone(), value);
        }

        Ok(trial)
    }

    /// Completes trial `number` with objective `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`] or [`Error::TrialAlreadyFinished`].
    pub fn tell(&self, number: u64, value: f64) -> Result<()> {
        self.finish(number, TrialState::Complete, Some(value))
    }

    /// Marks trial `number` as failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`] or [`Error::TrialAlreadyFinished`].
    pub fn tell_failed(&self, number: u64) -> Result<()> {
        self.finish(number, TrialState::Failed, None)
    }

    /// Records a trial produced elsewhere, e.g. by another worker sharing this
    /// history. Later trial numbers continue after `trial.number`.
    pub fn push(&self, trial: FrozenTrial) {
        self.next_number.fetch_max(trial.number + 1, Ordering::SeqCst);
        self.trials.write().push(trial);
    }

    /// Runs `n_trials` trials over `space`.
    ///
    /// Objective errors and non-finite values mark the trial as failed and the
    /// loop continues.
    ///
    /// # Errors
    ///
    /// Propagates sampler errors.
    pub fn optimize<F>(&self, n_trials: usize, space: &SearchSpace, mut objective: F) -> Result<()>
    where
        F: FnMut(&FrozenTrial) -> Result<f64>,
    {
        for _ in 0..n_trials {
            let trial = self.ask(space)?;
            let number = trial.number;
            match objective(&trial) {
                Ok(value) if value.is_finite() => {
                    let improved = self
                        .best_trial()
                        .ok()
                        .and_then(|best| best.value)
                        .is_none_or(|best| {
                            self.direction.to_minimization(value)
                                < self.direction.to_minimization(best)
                        });
                    self.tell(number, value)?;
                    if improved {
                        trace_info!(trial = number, value, "new best value found");
                    }
                }
                _ => {
                    trace_debug!(trial = number, "trial failed");
                    self.tell_failed(number)?;
                }
            }
        }
        Ok(())
    }

    /// Returns the completed trial with the best objective value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompletedTrials`] if nothing has completed yet.
    pub fn best_trial(&self) -> Result<FrozenTrial> {
        let direction = self.direction;
        self.trials
            .read()
            .iter()
            .filter(|t| t.is_complete())
            .filter_map(|t| t.value.map(|v| (direction.to_minimization(v), t)))
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, t)| t.clone())
            .ok_or(Error::NoCompletedTrials)
    }

    /// Number of trials recorded, in any state.
    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.trials.read().len()
    }

    fn replace(&self, trial: &FrozenTrial) -> Result<()> {
        let mut trials = self.trials.write();
        let slot = trials
            .iter_mut()
            .find(|t| t.number == trial.number)
            .ok_or(Error::UnknownTrial(trial.number))?;
        *slot = trial.clone();
        Ok(())
    }

    fn finish(&self, number: u64, state: TrialState, value: Option<f64>) -> Result<()> {
        let mut trials = self.trials.write();
        let trial = trials
            .iter_mut()
            .find(|t| t.number == number)
            .ok_or(Error::UnknownTrial(number))?;
        if trial.state.is_finished() {
            return Err(Error::TrialAlreadyFinished(number));
        }
        trial.state = state;
        trial.value = value;
        Ok(())
    }
}

impl StudyHistory for InMemoryStudy {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn trials(&self) -> Vec<FrozenTrial> {
        self.trials.read().clone()
    }
}
