//! Operator-initiated teardown.
//!
//! Never triggered by a failed run. Removes components in reverse pipeline
//! order and stops at the first failure, leaving earlier components intact.

use super::spec::StageSpec;
use super::validate::validate_graph;
use crate::adapters::Adapters;
use crate::core::ComponentKind;
use crate::errors::{DeployError, PreconditionError};
use crate::stages::{driver_for, TeardownAction};
use std::fmt;
use tracing::{info, warn};

/// Teardown options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownOptions {
    /// Also delete the cluster.
    pub include_cluster: bool,
}

/// What happened to one stage's component.
#[derive(Debug, Clone)]
pub enum TeardownStatus {
    /// The component was removed.
    Removed,
    /// Nothing was there.
    Absent,
    /// Not touched.
    Skipped(String),
    /// Removal failed.
    Failed(DeployError),
}

/// Per-stage teardown results, in the order they were attempted.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    /// `(stage, status)` pairs.
    pub stages: Vec<(String, TeardownStatus)>,
}

impl TeardownReport {
    /// Returns true if no removal failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self
            .stages
            .iter()
            .any(|(_, status)| matches!(status, TeardownStatus::Failed(_)))
    }

    /// Returns the status for `stage`.
    #[must_use]
    pub fn status(&self, stage: &str) -> Option<&TeardownStatus> {
        self.stages
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, status)| status)
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (stage, status) in &self.stages {
            match status {
                TeardownStatus::Removed => writeln!(f, "  {stage}: removed")?,
                TeardownStatus::Absent => writeln!(f, "  {stage}: absent")?,
                TeardownStatus::Skipped(reason) => writeln!(f, "  {stage}: skipped: {reason}")?,
                TeardownStatus::Failed(err) => writeln!(f, "  {stage}: failed: {err}")?,
            }
        }
        Ok(())
    }
}

/// Removes the components `specs` describe, last stage first.
///
/// # Errors
///
/// `PreconditionError` if the sequence is invalid. Removal failures are in
/// the report.
pub async fn teardown(
    specs: &[StageSpec],
    adapters: &Adapters,
    options: TeardownOptions,
) -> Result<TeardownReport, PreconditionError> {
    validate_graph(specs)?;

    let mut report = TeardownReport::default();
    for spec in specs.iter().rev() {
        let status = if !spec.enabled {
            TeardownStatus::Skipped("disabled by operator".to_string())
        } else if spec.kind() == ComponentKind::Cluster && !options.include_cluster {
            TeardownStatus::Skipped("cluster kept".to_string())
        } else {
            info!(stage = %spec.name, resource = %spec.resource(), "Tearing down");
            match driver_for(spec, adapters).teardown().await {
                Ok(TeardownAction::Removed) => TeardownStatus::Removed,
                Ok(TeardownAction::Absent) => TeardownStatus::Absent,
                Err(err) => {
                    warn!(stage = %spec.name, error = %err, "Teardown failed");
                    TeardownStatus::Failed(err)
                }
            }
        };

        let failed = matches!(status, TeardownStatus::Failed(_));
        report.stages.push((spec.name.clone(), status));
        if failed {
            break;
        }
    }
    Ok(report)
}
