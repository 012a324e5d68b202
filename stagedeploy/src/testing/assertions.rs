//! Assertions over run outcomes.

use crate::pipeline::{RunOutcome, StageResult};

/// Asserts that every planned stage succeeded or was skipped.
pub fn assert_run_succeeded(outcome: &RunOutcome) {
    assert!(outcome.is_success(), "Expected run to succeed:\n{outcome}");
}

/// Asserts that the run halted at `stage`.
pub fn assert_halted_at(outcome: &RunOutcome, stage: &str) {
    assert_eq!(
        outcome.halted_at(),
        Some(stage),
        "Expected run to halt at '{stage}':\n{outcome}"
    );
}

/// Asserts that `stage` failed with an error of `kind`.
pub fn assert_stage_failed_with(outcome: &RunOutcome, stage: &str, kind: &str) {
    let record = outcome
        .record(stage)
        .unwrap_or_else(|| panic!("Expected a record for '{stage}':\n{outcome}"));
    match &record.result {
        StageResult::Failed(err) => assert_eq!(
            err.kind(),
            kind,
            "Expected '{stage}' to fail with {kind}, got: {err}"
        ),
        other => panic!("Expected '{stage}' to fail with {kind}, got: {other:?}"),
    }
}

/// Asserts that `stages` have no record.
pub fn assert_not_attempted(outcome: &RunOutcome, stages: &[&str]) {
    for stage in stages {
        assert!(
            outcome.record(stage).is_none(),
            "Expected '{stage}' not to be attempted:\n{outcome}"
        );
    }
}

/// Asserts that `stage` succeeded against an already-ready resource.
pub fn assert_already_ready(outcome: &RunOutcome, stage: &str) {
    let record = outcome
        .record(stage)
        .unwrap_or_else(|| panic!("Expected a record for '{stage}':\n{outcome}"));
    assert!(
        record.result.is_success() && record.already_ready && !record.provisioned,
        "Expected '{stage}' to be already ready, got: {}",
        record.summary()
    );
}
