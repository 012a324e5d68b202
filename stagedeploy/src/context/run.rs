//! The run's single mutable aggregate.

use super::{ResolvedConfig, RunIdentity};
use crate::errors::{DeployError, DeployResult, UndeclaredDependencyError};
use crate::pipeline::{RunOutcome, StageRecord, StageResult, StageSpec};
use chrono::Utc;
use std::collections::BTreeSet;

/// Records produced so far and the cumulative resolved config.
///
/// Owned by the orchestrator. Stages only see a [`StageView`].
#[derive(Debug)]
pub struct RunContext {
    identity: RunIdentity,
    records: Vec<StageRecord>,
    resolved: ResolvedConfig,
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new(identity: RunIdentity) -> Self {
        Self {
            identity,
            records: Vec::new(),
            resolved: ResolvedConfig::new(),
        }
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the records appended so far.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Returns the cumulative resolved config.
    #[must_use]
    pub fn resolved(&self) -> &ResolvedConfig {
        &self.resolved
    }

    /// Returns a read-only view scoped to `spec`'s dependencies.
    #[must_use]
    pub fn view<'a>(&'a self, spec: &'a StageSpec) -> StageView<'a> {
        StageView {
            stage: &spec.name,
            dependencies: &spec.dependencies,
            resolved: &self.resolved,
            identity: &self.identity,
        }
    }

    /// Appends a stage record and merges the config it contributed.
    ///
    /// A contribution that would overwrite an existing key turns the record
    /// into a `ConfigConflict` failure and nothing is merged.
    pub fn record(&mut self, mut record: StageRecord) -> &StageRecord {
        if let StageResult::Succeeded(config) = &record.result {
            if let Err(err) = self.resolved.merge(config) {
                record.result = StageResult::Failed(err.into());
            }
        }
        let index = self.records.len();
        self.records.push(record);
        &self.records[index]
    }

    /// Consumes the context into the run outcome.
    #[must_use]
    pub fn into_outcome(self, planned: Vec<String>, cancelled: Option<String>) -> RunOutcome {
        RunOutcome {
            identity: self.identity,
            records: self.records,
            resolved: self.resolved,
            planned,
            cancelled,
            ended_at: Utc::now(),
        }
    }
}

/// What one stage may read from the run.
#[derive(Debug, Clone, Copy)]
pub struct StageView<'a> {
    stage: &'a str,
    dependencies: &'a BTreeSet<String>,
    resolved: &'a ResolvedConfig,
    identity: &'a RunIdentity,
}

impl<'a> StageView<'a> {
    /// Returns the viewing stage's name.
    #[must_use]
    pub fn stage(&self) -> &'a str {
        self.stage
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &'a RunIdentity {
        self.identity
    }

    /// Reads `key` contributed by `stage`.
    ///
    /// # Errors
    ///
    /// - `UndeclaredDependency` if `stage` is not a declared dependency.
    /// - `MissingEndpoint` if the dependency did not contribute `key`.
    pub fn endpoint(&self, stage: &str, key: &str) -> DeployResult<&'a str> {
        if !self.dependencies.contains(stage) {
            return Err(UndeclaredDependencyError::new(self.stage, stage).into());
        }
        self.resolved
            .get(stage, key)
            .ok_or_else(|| DeployError::MissingEndpoint {
                stage: stage.to_string(),
                key: key.to_string(),
            })
    }
}
