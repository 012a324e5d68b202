//! Testing utilities for deployment runs.
//!
//! This module provides:
//! - An in-memory environment implementing every adapter
//! - Scripted probes and a recording event sink
//! - Demo fixtures and outcome assertions

mod assertions;
mod fake;
pub mod fixtures;
mod mocks;

pub use assertions::{
    assert_already_ready, assert_halted_at, assert_not_attempted, assert_run_succeeded,
    assert_stage_failed_with,
};
pub use fake::FakeEnvironment;
pub use fixtures::{demo_config, demo_specs};
pub use mocks::{RecordingEventSink, ScriptedProbe};
