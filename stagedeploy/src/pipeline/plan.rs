//! Dry-run planning.

use super::spec::StageSpec;
use super::validate::validate;
use crate::context::ResolvedConfig;
use crate::core::{ComponentKind, ResourceId};
use crate::errors::PreconditionError;
use crate::provision::ConfigResolver;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// One stage as it would run.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStage {
    /// Stage name.
    pub stage: String,
    /// Position in the run.
    pub ordinal: usize,
    /// Component.
    pub kind: ComponentKind,
    /// Target resource.
    pub resource: ResourceId,
    /// Whether the stage will run.
    pub enabled: bool,
    /// Declared dependencies.
    pub dependencies: BTreeSet<String>,
    /// Values the stage will contribute on success.
    pub contributes: ResolvedConfig,
}

/// The validated execution order.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Stages in execution order.
    pub stages: Vec<PlannedStage>,
}

/// Validates `specs` and describes what a run would do. Makes no adapter calls.
///
/// # Errors
///
/// `PreconditionError` exactly as [`Orchestrator::run`](super::Orchestrator::run)
/// would report it.
pub fn plan(specs: &[StageSpec]) -> Result<Plan, PreconditionError> {
    validate(specs)?;

    let stages = specs
        .iter()
        .map(|spec| {
            let resource = spec.resource();
            let contributes = ConfigResolver::resolve(&spec.name, &resource, &spec.params.endpoints())
                .map_err(|err| {
                    PreconditionError::new(err.to_string()).with_stages(vec![spec.name.clone()])
                })?;
            Ok(PlannedStage {
                stage: spec.name.clone(),
                ordinal: spec.ordinal,
                kind: spec.kind(),
                resource,
                enabled: spec.enabled,
                dependencies: spec.dependencies.clone(),
                contributes,
            })
        })
        .collect::<Result<Vec<_>, PreconditionError>>()?;

    Ok(Plan { stages })
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in &self.stages {
            let status = if stage.enabled { "" } else { " (disabled)" };
            writeln!(f, "{}. {} -> {}{status}", stage.ordinal + 1, stage.stage, stage.resource)?;
            if !stage.dependencies.is_empty() {
                let deps: Vec<_> = stage.dependencies.iter().map(String::as_str).collect();
                writeln!(f, "   after: {}", deps.join(", "))?;
            }
            for (key, value) in stage.contributes.iter() {
                writeln!(f, "   {key} = {value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::demo_specs;

    #[test]
    fn test_plan_lists_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(&demo_specs(dir.path())).unwrap();

        assert_eq!(plan.stages.len(), 5);
        let broker = &plan.stages[1];
        assert_eq!(
            broker.contributes.get("broker", "broker-address"),
            Some("redpanda-cluster.default.svc.cluster.local:9093")
        );
        let cluster = &plan.stages[0];
        assert_eq!(
            cluster.contributes.get("cluster", "kube-context"),
            Some("gke_demo-project_asia-northeast1-b_voltsp")
        );

        let rendered = plan.to_string();
        assert!(rendered.contains("4. stream-processor -> helm-release/voltdb/pipeline1"));
        assert!(rendered.contains("after: broker, database"));
    }

    #[test]
    fn test_plan_rejects_invalid_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut specs = demo_specs(dir.path());
        specs.swap(1, 3);
        let err = plan(&specs).unwrap_err();
        assert_eq!(err.code(), Some("DEPLOY-004-FORWARD_REF"));
    }
}
