//! Pipeline validation, planning, execution and teardown.
//!
//! This module provides:
//! - Stage specifications
//! - Static validation of the stage sequence
//! - The sequential orchestrator and its outcome
//! - Dry-run planning and operator teardown

mod orchestrator;
mod outcome;
mod plan;
mod spec;
mod teardown;
mod validate;


pub use orchestrator::Orchestrator;
pub use outcome::{RunOutcome, StageRecord, StageResult};
pub use plan::{plan, Plan, PlannedStage};
pub use spec::{StageParams, StageSpec};
pub use teardown::{teardown, TeardownOptions, TeardownReport, TeardownStatus};
pub use validate::{is_dns_label, validate, validate_files, validate_graph};
