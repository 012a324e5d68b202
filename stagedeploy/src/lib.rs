//! # Stagedeploy
//!
//! Dependency-ordered, idempotent provisioning of a streaming-data demo
//! stack: a managed cluster, a message broker, an operational database, a
//! stream processor and a load generator.
//!
//! Stagedeploy provides:
//!
//! - **Static validation**: the stage sequence is checked before any external call
//! - **Probe-first stages**: every stage observes its resource before acting and
//!   provisions at most once per run
//! - **Bounded readiness waits**: fixed-interval polling with a deadline
//! - **Resolved configuration**: addresses computed by earlier stages flow to
//!   later ones through declared dependencies only
//! - **Halt on failure**: the first failed stage stops the run; nothing is
//!   rolled back automatically
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagedeploy::prelude::*;
//!
//! let config = load_run_config(Path::new("deploy.yaml"))?;
//! let orchestrator = Orchestrator::with_adapters(adapters);
//! let outcome = orchestrator.run(&config.stage_specs()).await?;
//! println!("{outcome}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod provision;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{
        Adapters, ClusterAdapter, DatabaseAdapter, KubeAdapter, ReleaseAdapter, TopicAdapter,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{load_run_config, RunConfig};
    pub use crate::context::{ResolvedConfig, RunIdentity};
    pub use crate::core::{ComponentKind, ResourceId, ResourceState, StagePhase};
    pub use crate::errors::{AdapterError, DeployError, DeployResult, PreconditionError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        plan, teardown, Orchestrator, Plan, RunOutcome, StageRecord, StageResult, StageSpec,
        TeardownOptions, TeardownReport,
    };
    pub use crate::provision::{RegistryCredentials, WaitPolicy};
}
