//! Sampler that delegates joint sampling to a Bayesian-optimization backend.
//!
//! Each relative-sampling call builds a fresh [`SpaceConverter`] over the
//! joint search space, replays the completed history into a newly constructed
//! backend optimizer and asks it for one point. Parameters outside the joint
//! space, and every parameter of the first trial, go to an independent
//! sampler ([`RandomSampler`] by default).
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use optimizer_bo::backend::{BackendOptions, GpBackend};
//! use optimizer_bo::distribution::Distribution;
//! use optimizer_bo::sampler::BoSampler;
//! use optimizer_bo::{Direction, InMemoryStudy};
//!
//! let sampler = BoSampler::builder(GpBackend::new())
//!     .backend_options(
//!         BackendOptions::new()
//!             .with("n_initial_points", 5)
//!             .with("random_state", 7),
//!     )
//!     .warn_independent_sampling(false)
//!     .build()
//!     .unwrap();
//!
//! let study = InMemoryStudy::with_sampler(Direction::Minimize, sampler);
//! let mut space = BTreeMap::new();
//! space.insert("x".to_string(), Distribution::uniform(-5.0, 5.0).unwrap());
//! space.insert("n".to_string(), Distribution::int_uniform(0, 4).unwrap());
//!
//! study
//!     .optimize(12, &space, |trial| {
//!         let x = trial.params["x"].as_f64().unwrap_or_default();
//!         let n = trial.params["n"].as_i64().unwrap_or_default();
//!         Ok(x * x + (n as f64 - 2.0).abs())
//!     })
//!     .unwrap();
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{Backend, BackendOptions, DIMENSIONS_KEY, OptionValue};
use crate::converter::{ReplayReport, SpaceConverter};
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::sampler::Sampler;
use crate::sampler::random::RandomSampler;
use crate::search_space::{IntersectionSearchSpace, SearchSpace};
use crate::study::StudyHistory;
use crate::trial::FrozenTrial;

/// Relative sampler backed by a [`Backend`].
///
/// Only constructible through [`BoSamplerBuilder::build`], which probes the
/// backend first; an unavailable backend never reaches a study.
pub struct BoSampler {
    backend: Arc<dyn Backend>,
    independent_sampler: Box<dyn Sampler>,
    warn_independent_sampling: bool,
    backend_options: BackendOptions,
    last_replay: Mutex<Option<ReplayReport>>,
}

impl core::fmt::Debug for BoSampler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoSampler")
            .field("backend", &self.backend.name())
            .field("warn_independent_sampling", &self.warn_independent_sampling)
            .field("backend_options", &self.backend_options)
            .field("last_replay", &*self.last_replay.lock())
            .finish_non_exhaustive()
    }
}

impl BoSampler {
    /// Creates a sampler with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the backend fails its probe.
    pub fn new(backend: impl Backend + 'static) -> Result<Self> {
        Self::builder(backend).build()
    }

    /// Creates a builder for configuring a `BoSampler`.
    #[must_use]
    pub fn builder(backend: impl Backend + 'static) -> BoSamplerBuilder {
        BoSamplerBuilder::new(Arc::new(backend))
    }

    /// The options forwarded to the backend on every call.
    #[must_use]
    pub fn backend_options(&self) -> &BackendOptions {
        &self.backend_options
    }

    /// Replay counts of the most recent relative-sampling call.
    ///
    /// `None` until the backend has been used once.
    #[must_use]
    pub fn last_replay(&self) -> Option<ReplayReport> {
        *self.last_replay.lock()
    }
}

/// The search space eligible for backend-driven sampling.
///
/// Intersection of the completed trials' distributions, without
/// non-categorical distributions that hold a single value: they leave the
/// backend nothing to optimize and are cheaper to handle independently.
#[must_use]
pub fn joint_search_space(trials: &[FrozenTrial]) -> SearchSpace {
    let mut space = IntersectionSearchSpace::calculate(trials);
    space.retain(|_, d| d.is_categorical() || !d.is_single());
    space
}

fn has_completed_trial(study: &dyn StudyHistory) -> bool {
    study.trials().iter().any(FrozenTrial::is_complete)
}

impl Sampler for BoSampler {
    fn infer_relative_search_space(
        &self,
        study: &dyn StudyHistory,
        _trial: &FrozenTrial,
    ) -> SearchSpace {
        joint_search_space(&study.trials())
    }

    fn sample_relative(
        &self,
        study: &dyn StudyHistory,
        _trial: &FrozenTrial,
        search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, ParamValue>> {
        if search_space.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut converter = SpaceConverter::new(
            search_space.clone(),
            self.backend.as_ref(),
            &self.backend_options,
        )?;
        let report = converter.replay(study)?;
        trace_debug!(
            observed = report.observed,
            excluded = report.excluded,
            "replayed history into backend"
        );
        *self.last_replay.lock() = Some(report);

        converter.propose()
    }

    fn sample_independent(
        &self,
        study: &dyn StudyHistory,
        trial: &FrozenTrial,
        name: &str,
        distribution: &Distribution,
    ) -> Result<ParamValue> {
        if self.warn_independent_sampling && has_completed_trial(study) {
            trace_warn!(
                param = name,
                trial = trial.number,
                backend = self.backend.name(),
                "parameter sampled by the independent sampler, not the backend"
            );
        }

        self.independent_sampler
            .sample_independent(study, trial, name, distribution)
    }
}

/// Builder for configuring a [`BoSampler`].
///
/// Defaults:
/// - independent sampler: [`RandomSampler`]
/// - `warn_independent_sampling`: `true`
/// - backend options: empty
pub struct BoSamplerBuilder {
    backend: Arc<dyn Backend>,
    independent_sampler: Option<Box<dyn Sampler>>,
    warn_independent_sampling: bool,
    backend_options: BackendOptions,
}

impl core::fmt::Debug for BoSamplerBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoSamplerBuilder")
            .field("backend", &self.backend.name())
            .field(
                "custom_independent_sampler",
                &self.independent_sampler.is_some(),
            )
            .field("warn_independent_sampling", &self.warn_independent_sampling)
            .field("backend_options", &self.backend_options)
            .finish()
    }
}

impl BoSamplerBuilder {
    /// Creates a builder around a shared backend.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            independent_sampler: None,
            warn_independent_sampling: true,
            backend_options: BackendOptions::new(),
        }
    }

    /// Sets the sampler used for parameters outside the joint search space.
    #[must_use]
    pub fn independent_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.independent_sampler = Some(Box::new(sampler));
        self
    }

    /// Enables or disables the warning emitted when a parameter is sampled
    /// independently after the first trial completed.
    ///
    /// The first trial is always sampled independently and never warns.
    #[must_use]
    pub fn warn_independent_sampling(mut self, warn: bool) -> Self {
        self.warn_independent_sampling = warn;
        self
    }

    /// Replaces the options forwarded to the backend.
    ///
    /// The `"dimensions"` key is ignored; dimensions always come from the
    /// search space.
    #[must_use]
    pub fn backend_options(mut self, options: BackendOptions) -> Self {
        self.backend_options = options;
        self
    }

    /// Sets a single backend option.
    #[must_use]
    pub fn backend_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Self {
        self.backend_options.insert(key, value);
        self
    }

    /// Probes the backend and builds the sampler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] with the probe's error if the
    /// backend cannot be used.
    pub fn build(self) -> Result<BoSampler> {
        self.backend
            .probe()
            .map_err(|reason| Error::BackendUnavailable {
                backend: self.backend.name().to_string(),
                reason,
            })?;

        let mut backend_options = self.backend_options;
        if backend_options.remove(DIMENSIONS_KEY).is_some() {
            trace_debug!("ignoring the `dimensions` backend option");
        }

        Ok(BoSampler {
            backend: self.backend,
            independent_sampler: self
                .independent_sampler
                .unwrap_or_else(|| Box::new(RandomSampler::new())),
            warn_independent_sampling: self.warn_independent_sampling,
            backend_options,
            last_replay: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendValue;
    use crate::backend::fake::FakeBackend;
    use crate::study::InMemoryStudy;
    use crate::types::{Direction, TrialState};

    /// Independent sampler that always answers the same value.
    struct Constant(ParamValue);

    impl Sampler for Constant {
        fn sample_independent(
            &self,
            _study: &dyn StudyHistory,
            _trial: &FrozenTrial,
            _name: &str,
            _distribution: &Distribution,
        ) -> Result<ParamValue> {
            Ok(self.0.clone())
        }
    }

    fn x() -> Distribution {
        Distribution::uniform(0.0, 10.0).unwrap()
    }

    #[test]
    fn unavailable_backend_fails_at_build() {
        let err = BoSampler::new(FakeBackend::unavailable("libfoo.so: cannot open")).unwrap_err();
        match err {
            Error::BackendUnavailable { backend, reason } => {
                assert_eq!(backend, "fake");
                assert_eq!(reason, "libfoo.so: cannot open");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dimensions_option_is_stripped() {
        let sampler = BoSampler::builder(FakeBackend::new())
            .backend_option("dimensions", "whatever")
            .backend_option("n_initial_points", 4)
            .build()
            .unwrap();
        assert!(!sampler.backend_options().contains_key(DIMENSIONS_KEY));
        assert_eq!(
            sampler.backend_options().get_usize("n_initial_points").unwrap(),
            Some(4)
        );
    }

    #[test]
    fn joint_space_drops_single_valued_non_categorical() {
        let fixed = Distribution::uniform(1.0, 1.0).unwrap();
        let one = Distribution::int_uniform(3, 3).unwrap();
        let only = Distribution::categorical(["a"]).unwrap();
        let trials = vec![
            FrozenTrial::completed(0, 1.0)
                .with_param("x", x(), ParamValue::Float(1.0))
                .with_param("fixed", fixed, ParamValue::Float(1.0))
                .with_param("one", one, ParamValue::Int(3))
                .with_param("only", only, ParamValue::Choice("a".into())),
        ];
        let space = joint_search_space(&trials);
        assert_eq!(space.keys().collect::<Vec<_>>(), vec!["only", "x"]);
    }

    #[test]
    fn joint_space_is_empty_without_completed_trials() {
        let running = FrozenTrial::new(0).with_param("x", x(), ParamValue::Float(1.0));
        assert_eq!(running.state, TrialState::Running);
        assert!(joint_search_space(&[running]).is_empty());
    }

    #[test]
    fn empty_space_never_touches_backend() {
        let backend = FakeBackend::new();
        let sampler = BoSampler::new(backend.clone()).unwrap();
        let study = InMemoryStudy::new(Direction::Minimize);
        let proposal = sampler
            .sample_relative(&study, &FrozenTrial::new(0), &SearchSpace::new())
            .unwrap();
        assert!(proposal.is_empty());
        assert!(backend.calls().constructed.is_empty());
        assert_eq!(backend.calls().asked, 0);
        assert_eq!(sampler.last_replay(), None);
    }

    #[test]
    fn relative_sampling_replays_then_proposes() {
        let backend = FakeBackend::answering(vec![vec![BackendValue::Real(7.5)]]);
        let sampler = BoSampler::new(backend.clone()).unwrap();
        let study = InMemoryStudy::new(Direction::Minimize);
        study.push(FrozenTrial::completed(0, 2.0).with_param("x", x(), ParamValue::Float(1.0)));
        study.push(FrozenTrial::completed(1, 3.0).with_param("x", x(), ParamValue::Float(15.0)));

        let trial = FrozenTrial::new(2);
        let space = sampler.infer_relative_search_space(&study, &trial);
        // Trial #1 recorded the same distribution but an out-of-range value.
        assert!(space.contains_key("x"));

        let proposal = sampler.sample_relative(&study, &trial, &space).unwrap();
        assert_eq!(proposal["x"], ParamValue::Float(7.5));

        let calls = backend.calls();
        assert_eq!(calls.constructed.len(), 1);
        assert_eq!(calls.told.len(), 1);
        assert_eq!(calls.told[0].1, vec![2.0]);
        assert_eq!(calls.asked, 1);
        assert_eq!(
            sampler.last_replay(),
            Some(ReplayReport {
                observed: 1,
                excluded: 1
            })
        );
    }

    #[test]
    fn each_call_builds_a_fresh_optimizer() {
        let backend = FakeBackend::new();
        let sampler = BoSampler::new(backend.clone()).unwrap();
        let study = InMemoryStudy::new(Direction::Minimize);
        study.push(FrozenTrial::completed(0, 2.0).with_param("x", x(), ParamValue::Float(1.0)));
        let space = joint_search_space(&study.trials());

        for number in 1..=3 {
            sampler
                .sample_relative(&study, &FrozenTrial::new(number), &space)
                .unwrap();
        }
        assert_eq!(backend.calls().constructed.len(), 3);
        assert_eq!(backend.calls().told.len(), 3);
    }

    #[test]
    fn independent_sampling_delegates() {
        let sampler = BoSampler::builder(FakeBackend::new())
            .independent_sampler(Constant(ParamValue::Int(9)))
            .build()
            .unwrap();
        let study = InMemoryStudy::new(Direction::Minimize);
        let value = sampler
            .sample_independent(
                &study,
                &FrozenTrial::new(0),
                "n",
                &Distribution::int_uniform(0, 10).unwrap(),
            )
            .unwrap();
        assert_eq!(value, ParamValue::Int(9));
    }

    #[test]
    fn debug_names_the_backend() {
        let builder = BoSampler::builder(FakeBackend::new()).backend_option("xi", 0.1);
        assert!(format!("{builder:?}").contains("\"fake\""));
        let sampler = builder.build().unwrap();
        let rendered = format!("{sampler:?}");
        assert!(rendered.starts_with("BoSampler"));
        assert!(rendered.contains("\"fake\""));
    }

    #[cfg(feature = "tracing")]
    mod warning {
        use std::collections::BTreeMap;
        use std::sync::Arc;

        use parking_lot::Mutex;
        use tracing::field::{Field, Visit};
        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

        use super::*;

        type Fields = BTreeMap<String, String>;

        /// Records the fields of every `warn` event.
        #[derive(Clone, Default)]
        struct WarnLog(Arc<Mutex<Vec<Fields>>>);

        struct FieldVisitor<'a>(&'a mut Fields);

        impl Visit for FieldVisitor<'_> {
            fn record_str(&mut self, field: &Field, value: &str) {
                self.0.insert(field.name().to_string(), value.to_string());
            }

            fn record_u64(&mut self, field: &Field, value: u64) {
                self.0.insert(field.name().to_string(), value.to_string());
            }

            fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
                self.0.insert(field.name().to_string(), format!("{value:?}"));
            }
        }

        impl<S: Subscriber> Layer<S> for WarnLog {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                if *event.metadata().level() != Level::WARN {
                    return;
                }
                let mut fields = Fields::new();
                event.record(&mut FieldVisitor(&mut fields));
                self.0.lock().push(fields);
            }
        }

        fn capture_warnings(f: impl FnOnce()) -> Vec<Fields> {
            let log = WarnLog::default();
            let subscriber = tracing_subscriber::registry().with(log.clone());
            tracing::subscriber::with_default(subscriber, f);
            let events = log.0.lock().clone();
            events
        }

        fn sample_y(sampler: &BoSampler, study: &InMemoryStudy, number: u64) {
            sampler
                .sample_independent(
                    study,
                    &FrozenTrial::new(number),
                    "y",
                    &Distribution::int_uniform(0, 3).unwrap(),
                )
                .unwrap();
        }

        #[test]
        fn silent_before_any_trial_completes() {
            let sampler = BoSampler::new(FakeBackend::new()).unwrap();
            let study = InMemoryStudy::new(Direction::Minimize);
            study.push(FrozenTrial::new(0));

            let events = capture_warnings(|| sample_y(&sampler, &study, 1));
            assert!(events.is_empty(), "{events:?}");
        }

        #[test]
        fn names_parameter_trial_and_backend() {
            let sampler = BoSampler::new(FakeBackend::new()).unwrap();
            let study = InMemoryStudy::new(Direction::Minimize);
            study.push(FrozenTrial::completed(0, 1.0).with_param("x", x(), ParamValue::Float(2.0)));

            let events = capture_warnings(|| sample_y(&sampler, &study, 4));
            assert_eq!(events.len(), 1);
            assert_eq!(events[0]["param"], "y");
            assert_eq!(events[0]["trial"], "4");
            assert_eq!(events[0]["backend"], "fake");
        }

        #[test]
        fn disabled_warning_stays_silent() {
            let sampler = BoSampler::builder(FakeBackend::new())
                .warn_independent_sampling(false)
                .build()
                .unwrap();
            let study = InMemoryStudy::new(Direction::Minimize);
            study.push(FrozenTrial::completed(0, 1.0).with_param("x", x(), ParamValue::Float(2.0)));

            let events = capture_warnings(|| sample_y(&sampler, &study, 1));
            assert!(events.is_empty(), "{events:?}");
        }
    }

    #[test]
    fn warning_only_after_a_completed_trial() {
        let study = InMemoryStudy::new(Direction::Minimize);
        assert!(!has_completed_trial(&study));
        study.push(FrozenTrial::new(0));
        assert!(!has_completed_trial(&study));
        study.push(FrozenTrial::completed(1, 0.0));
        assert!(has_completed_trial(&study));
    }
}
