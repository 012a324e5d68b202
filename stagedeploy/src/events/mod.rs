//! Run lifecycle events.
//!
//! The orchestrator and stage controller emit one event per transition. Event
//! names are the constants below; payloads are small JSON objects carrying
//! the run id, stage name and resource identifier.

mod sink;

pub use sink::{EventSink, LoggingEventSink, NoOpEventSink};

/// A run began after validation.
pub const RUN_STARTED: &str = "run.started";
/// A stage was entered.
pub const STAGE_STARTED: &str = "stage.started";
/// The first probe of a stage's resource returned.
pub const STAGE_PROBED: &str = "stage.probed";
/// A stage is invoking its provisioning action.
pub const STAGE_PROVISIONING: &str = "stage.provisioning";
/// A stage is waiting for readiness.
pub const STAGE_WAITING: &str = "stage.waiting";
/// A stage succeeded.
pub const STAGE_SUCCEEDED: &str = "stage.succeeded";
/// A stage was skipped.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// A stage failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// The run stopped at a failed stage.
pub const RUN_HALTED: &str = "run.halted";
/// The run stopped at a cancellation point.
pub const RUN_CANCELLED: &str = "run.cancelled";
/// Every stage succeeded or was skipped.
pub const RUN_COMPLETED: &str = "run.completed";

pub(crate) fn is_failure(event_type: &str) -> bool {
    matches!(event_type, STAGE_FAILED | RUN_HALTED)
}
