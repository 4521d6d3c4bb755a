#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Bayesian-optimization sampler that delegates joint sampling to a
//! pluggable backend optimizer.
//!
//! A [`BoSampler`](sampler::BoSampler) plugs into a study's two-phase
//! sampling protocol. For the *relative* phase it converts the joint search
//! space into backend [`Dimension`](backend::Dimension)s, replays the
//! completed trial history into a freshly constructed backend optimizer and
//! converts the optimizer's proposal back into parameter values. Everything
//! else is handed to an *independent* sampler.
//!
//! # Getting Started
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use optimizer_bo::prelude::*;
//!
//! let sampler = BoSampler::builder(GpBackend::new())
//!     .backend_option("n_initial_points", 4)
//!     .backend_option("random_state", 1)
//!     .build()
//!     .unwrap();
//! let study = InMemoryStudy::with_sampler(Direction::Minimize, sampler);
//!
//! let mut space = BTreeMap::new();
//! space.insert("x".to_string(), Distribution::uniform(-10.0, 10.0).unwrap());
//!
//! study
//!     .optimize(10, &space, |trial| {
//!         let x = trial.params["x"].as_f64().unwrap_or_default();
//!         Ok((x - 3.0).powi(2))
//!     })
//!     .unwrap();
//!
//! let best = study.best_trial().unwrap();
//! println!("f(x) = {:.4}", best.value.unwrap_or_default());
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Distribution`](distribution::Distribution) | Domain of one parameter. |
//! | [`FrozenTrial`] | Snapshot of one trial: state, parameters, distributions, value. |
//! | [`StudyHistory`] | Read-only view of a study handed to samplers. |
//! | [`Sampler`](sampler::Sampler) | Two-phase sampling strategy (relative, then independent). |
//! | [`Backend`](backend::Backend) | Factory for the optimizer that proposes joint points. |
//! | [`SpaceConverter`](converter::SpaceConverter) | Maps between distributions and backend dimensions. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `gp` | [`GpBackend`](backend::GpBackend): Gaussian-process surrogate via `nalgebra` | on |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing), including the independent-sampling warning | on |
//! | `serde` | `Serialize`/`Deserialize` on trials, distributions and backend types | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod backend;
pub mod converter;
pub mod distribution;
mod error;
pub mod param;
mod rng_util;
pub mod sampler;
pub mod search_space;
mod study;
mod trial;
mod types;

pub use error::{Error, Result};
pub use study::{InMemoryStudy, StudyHistory};
pub use trial::FrozenTrial;
pub use types::{Direction, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use optimizer_bo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::{
        Backend, BackendOptimizer, BackendOptions, BackendValue, Dimension, GpBackend, Prior,
    };
    pub use crate::converter::{ReplayReport, SpaceConverter};
    pub use crate::distribution::{CustomDistribution, Distribution};
    pub use crate::error::{Error, Result};
    pub use crate::param::{ChoiceValue, ParamValue};
    pub use crate::sampler::{BoSampler, BoSamplerBuilder, RandomSampler, Sampler};
    pub use crate::search_space::{IntersectionSearchSpace, SearchSpace};
    pub use crate::study::{InMemoryStudy, StudyHistory};
    pub use crate::trial::FrozenTrial;
    pub use crate::types::{Direction, TrialState};
}
