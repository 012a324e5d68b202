//! Component kinds and stage phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The component a pipeline stage provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// The Kubernetes cluster everything else runs on.
    Cluster,
    /// The message broker.
    Broker,
    /// The operational database.
    Database,
    /// The stream processor reading from the broker into the database.
    StreamProcessor,
    /// The load generator feeding the broker.
    LoadGenerator,
}

impl ComponentKind {
    /// All components in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::Cluster,
        Self::Broker,
        Self::Database,
        Self::StreamProcessor,
        Self::LoadGenerator,
    ];

    /// Returns the canonical stage name for this component.
    #[must_use]
    pub const fn stage_name(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Broker => "broker",
            Self::Database => "database",
            Self::StreamProcessor => "stream-processor",
            Self::LoadGenerator => "load-generator",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage_name())
    }
}

/// A state of the per-stage state machine.
///
/// `NotStarted -> Probing -> (Provisioning | Waiting) -> Ready -> Succeeded`,
/// with `Failed` reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePhase {
    /// The stage has not been entered.
    NotStarted,
    /// Querying the target resource.
    Probing,
    /// Running the provisioning action.
    Provisioning,
    /// Waiting for readiness.
    Waiting,
    /// The resource is ready; post-conditions run here.
    Ready,
    /// The stage succeeded.
    Succeeded,
    /// The stage failed.
    Failed,
}

impl StagePhase {
    /// Returns true if the phase is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Probing => write!(f, "probing"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Waiting => write!(f, "waiting"),
            Self::Ready => write!(f, "ready"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let names: Vec<_> = ComponentKind::ALL.iter().map(|k| k.stage_name()).collect();
        assert_eq!(
            names,
            vec!["cluster", "broker", "database", "stream-processor", "load-generator"]
        );
    }

    #[test]
    fn test_component_kind_serialize() {
        let json = serde_json::to_string(&ComponentKind::StreamProcessor).unwrap();
        assert_eq!(json, r#""stream-processor""#);
    }

    #[test]
    fn test_phase_is_terminal() {
        assert!(StagePhase::Succeeded.is_terminal());
        assert!(StagePhase::Failed.is_terminal());
        assert!(!StagePhase::Waiting.is_terminal());
        assert!(!StagePhase::NotStarted.is_terminal());
    }
}
