//! Stage results and the run outcome.

use crate::context::{ResolvedConfig, RunIdentity};
use crate::core::{ComponentKind, ResourceId, StagePhase};
use crate::errors::DeployError;
use chrono::{DateTime, Utc};
use std::fmt;

/// Terminal result of one stage. Never retried within a run.
#[derive(Debug, Clone)]
pub enum StageResult {
    /// The stage's resource is ready; carries the values it contributed.
    Succeeded(ResolvedConfig),
    /// The stage did not run.
    Skipped(String),
    /// The stage failed.
    Failed(DeployError),
}

impl StageResult {
    /// Returns true for `Succeeded` and `Skipped`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    /// Returns true for `Failed`.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the error, if the stage failed.
    #[must_use]
    pub fn error(&self) -> Option<&DeployError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the contributed values, if the stage succeeded.
    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedConfig> {
        match self {
            Self::Succeeded(config) => Some(config),
            _ => None,
        }
    }
}

/// Everything recorded about one attempted stage.
#[derive(Debug, Clone)]
pub struct StageRecord {
    /// Stage name.
    pub stage: String,
    /// Component the stage provisions.
    pub kind: ComponentKind,
    /// Target resource.
    pub resource: ResourceId,
    /// Terminal result.
    pub result: StageResult,
    /// The first probe already reported `Ready`.
    pub already_ready: bool,
    /// The provisioning action was invoked.
    pub provisioned: bool,
    /// Phases the stage passed through, in order.
    pub transitions: Vec<StagePhase>,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
}

impl StageRecord {
    /// Creates a record for a stage skipped without probing.
    #[must_use]
    pub fn skipped(
        stage: impl Into<String>,
        kind: ComponentKind,
        resource: ResourceId,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            stage: stage.into(),
            kind,
            resource,
            result: StageResult::Skipped(reason.into()),
            already_ready: false,
            provisioned: false,
            transitions: vec![StagePhase::NotStarted],
            started_at: now,
            ended_at: now,
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns the last phase reached.
    #[must_use]
    pub fn final_phase(&self) -> StagePhase {
        self.transitions
            .last()
            .copied()
            .unwrap_or(StagePhase::NotStarted)
    }

    /// One-line status used in the run report.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.result {
            StageResult::Succeeded(_) if self.already_ready => {
                "succeeded (already ready)".to_string()
            }
            StageResult::Succeeded(_) => "succeeded".to_string(),
            StageResult::Skipped(reason) => format!("skipped: {reason}"),
            StageResult::Failed(err) => format!("failed: {err}"),
        }
    }
}

/// Aggregate of every stage result a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Run identity.
    pub identity: RunIdentity,
    /// Records in execution order. Stages never attempted have none.
    pub records: Vec<StageRecord>,
    /// Cumulative resolved config.
    pub resolved: ResolvedConfig,
    /// Every stage name in the sequence, in order.
    pub planned: Vec<String>,
    /// Cancellation reason, if the run was interrupted.
    pub cancelled: Option<String>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Returns true if every planned stage succeeded or was skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.cancelled.is_none()
            && self.records.len() == self.planned.len()
            && self.records.iter().all(|r| r.result.is_success())
    }

    /// Returns the stage the run halted at, if one failed.
    #[must_use]
    pub fn halted_at(&self) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.result.is_failure())
            .map(|r| r.stage.as_str())
    }

    /// Returns the planned stages that produced no record.
    #[must_use]
    pub fn not_attempted(&self) -> Vec<&str> {
        self.planned
            .iter()
            .filter(|name| self.record(name).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Returns the record for `stage`.
    #[must_use]
    pub fn record(&self, stage: &str) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.stage == stage)
    }

    /// Returns the stages whose provisioning action ran.
    #[must_use]
    pub fn provisioned_stages(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.provisioned)
            .map(|r| r.stage.as_str())
            .collect()
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.planned.iter().map(String::len).max().unwrap_or(0);
        writeln!(f, "run {}", self.identity.run_id)?;
        for name in &self.planned {
            match self.record(name) {
                Some(record) => writeln!(f, "  {name:<width$}  {}", record.summary())?,
                None => writeln!(f, "  {name:<width$}  not attempted")?,
            }
        }
        if let Some(reason) = &self.cancelled {
            writeln!(f, "cancelled: {reason}")?;
        }
        write!(f, "{}", if self.is_success() { "SUCCESS" } else { "FAILED" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(stage: &str, result: StageResult, already_ready: bool) -> StageRecord {
        let mut record = StageRecord::skipped(
            stage,
            ComponentKind::Broker,
            ResourceId::release("default", stage),
            "",
        );
        record.result = result;
        record.already_ready = already_ready;
        record
    }

    fn outcome(records: Vec<StageRecord>, planned: &[&str]) -> RunOutcome {
        RunOutcome {
            identity: RunIdentity::new(),
            records,
            resolved: ResolvedConfig::new(),
            planned: planned.iter().map(|s| (*s).to_string()).collect(),
            cancelled: None,
            ended_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_labels() {
        let ok = record("a", StageResult::Succeeded(ResolvedConfig::new()), false);
        let ready = record("b", StageResult::Succeeded(ResolvedConfig::new()), true);
        let skipped = record("c", StageResult::Skipped("disabled by operator".into()), false);
        let failed = record(
            "d",
            StageResult::Failed(DeployError::Cancelled {
                reason: "interrupt".into(),
            }),
            false,
        );

        assert_eq!(ok.summary(), "succeeded");
        assert_eq!(ready.summary(), "succeeded (already ready)");
        assert_eq!(skipped.summary(), "skipped: disabled by operator");
        assert_eq!(failed.summary(), "failed: Cancelled: interrupt");
    }

    #[test]
    fn test_success_requires_every_planned_stage() {
        let done = outcome(
            vec![record("a", StageResult::Succeeded(ResolvedConfig::new()), false)],
            &["a", "b"],
        );
        assert!(!done.is_success());
        assert_eq!(done.not_attempted(), vec!["b"]);
        assert!(done.halted_at().is_none());
    }

    #[test]
    fn test_halted_report() {
        let run = outcome(
            vec![
                record("a", StageResult::Skipped("disabled by operator".into()), false),
                record(
                    "b",
                    StageResult::Failed(DeployError::Cancelled {
                        reason: "interrupt".into(),
                    }),
                    false,
                ),
            ],
            &["a", "b", "c"],
        );

        assert!(!run.is_success());
        assert_eq!(run.halted_at(), Some("b"));
        let report = run.to_string();
        assert!(report.contains("a  skipped: disabled by operator"));
        assert!(report.contains("c  not attempted"));
        assert!(report.ends_with("FAILED"));
    }
}
