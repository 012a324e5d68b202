//! Run context.
//!
//! This module provides:
//! - The run identity stamped on every record
//! - The append-only resolved config
//! - The run context owned by the orchestrator, and the read-only view
//!   handed to each stage

mod identity;
mod resolved;
mod run;

pub use identity::RunIdentity;
pub use resolved::ResolvedConfig;
pub use run::{RunContext, StageView};
