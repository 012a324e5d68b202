//! Resource identifiers and observed resource states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of external resource a stage targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// A managed Kubernetes cluster.
    Cluster,
    /// A Kubernetes namespace.
    Namespace,
    /// A package-manager (Helm) release.
    HelmRelease,
    /// A Kubernetes batch job.
    Job,
    /// A Kubernetes secret.
    Secret,
    /// A stream topic on the broker.
    Topic,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster => write!(f, "cluster"),
            Self::Namespace => write!(f, "namespace"),
            Self::HelmRelease => write!(f, "helm-release"),
            Self::Job => write!(f, "job"),
            Self::Secret => write!(f, "secret"),
            Self::Topic => write!(f, "topic"),
        }
    }
}

/// Where a resource lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ResourceScope {
    /// Not scoped (e.g. a namespace itself).
    Global,
    /// Scoped to a Kubernetes namespace.
    Namespace {
        /// The namespace name.
        namespace: String,
    },
    /// Scoped to a cloud project and zone.
    Zone {
        /// The cloud project ID.
        project: String,
        /// The compute zone.
        zone: String,
    },
}

/// Identifies one external resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// The resource kind.
    pub kind: ResourceKind,
    /// The resource scope.
    pub scope: ResourceScope,
    /// The resource name.
    pub name: String,
}

impl ResourceId {
    /// Creates a resource identifier.
    #[must_use]
    pub fn new(kind: ResourceKind, scope: ResourceScope, name: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            name: name.into(),
        }
    }

    /// Identifies a cluster in a project and zone.
    #[must_use]
    pub fn cluster(project: impl Into<String>, zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            ResourceKind::Cluster,
            ResourceScope::Zone {
                project: project.into(),
                zone: zone.into(),
            },
            name,
        )
    }

    /// Identifies a namespaced resource.
    #[must_use]
    pub fn namespaced(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            kind,
            ResourceScope::Namespace {
                namespace: namespace.into(),
            },
            name,
        )
    }

    /// Identifies a Helm release.
    #[must_use]
    pub fn release(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::namespaced(ResourceKind::HelmRelease, namespace, name)
    }

    /// Identifies a batch job.
    #[must_use]
    pub fn job(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::namespaced(ResourceKind::Job, namespace, name)
    }

    /// Returns the namespace for namespaced resources.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match &self.scope {
            ResourceScope::Namespace { namespace } => Some(namespace),
            _ => None,
        }
    }

    /// Returns the project and zone for zonal resources.
    #[must_use]
    pub fn zone(&self) -> Option<(&str, &str)> {
        match &self.scope {
            ResourceScope::Zone { project, zone } => Some((project, zone)),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            ResourceScope::Global => write!(f, "{}/{}", self.kind, self.name),
            ResourceScope::Namespace { namespace } => {
                write!(f, "{}/{}/{}", self.kind, namespace, self.name)
            }
            ResourceScope::Zone { project, zone } => {
                write!(f, "{}/{}/{}/{}", self.kind, project, zone, self.name)
            }
        }
    }
}

/// The observed state of an external resource.
///
/// `Pending` and `Failed` are kept apart so that a waiter can tell transient
/// convergence from permanent breakage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResourceState {
    /// The resource does not exist.
    Absent,
    /// The resource exists but has not converged.
    Pending {
        /// Human-readable progress detail.
        detail: String,
    },
    /// The resource exists and is usable.
    Ready,
    /// The resource exists and is broken.
    Failed {
        /// The reported failure.
        reason: String,
    },
}

impl ResourceState {
    /// Creates a pending state.
    #[must_use]
    pub fn pending(detail: impl Into<String>) -> Self {
        Self::Pending {
            detail: detail.into(),
        }
    }

    /// Creates a failed state.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns true if the resource is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if the resource exists in any state.
    #[must_use]
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// Returns true if waiting longer cannot change the outcome.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed { .. })
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Pending { detail } if detail.is_empty() => write!(f, "pending"),
            Self::Pending { detail } => write!(f, "pending ({detail})"),
            Self::Ready => write!(f, "ready"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_display() {
        let cluster = ResourceId::cluster("demo-project", "asia-northeast1-b", "voltsp");
        assert_eq!(cluster.to_string(), "cluster/demo-project/asia-northeast1-b/voltsp");

        let release = ResourceId::release("voltdb", "volt-vwap");
        assert_eq!(release.to_string(), "helm-release/voltdb/volt-vwap");
        assert_eq!(release.namespace(), Some("voltdb"));
        assert!(release.zone().is_none());
    }

    #[test]
    fn test_state_predicates() {
        assert!(!ResourceState::Absent.exists());
        assert!(ResourceState::pending("0/3 pods").exists());
        assert!(!ResourceState::pending("0/3 pods").is_terminal());
        assert!(ResourceState::failed("CrashLoopBackOff").is_terminal());
        assert!(ResourceState::Ready.is_ready());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ResourceState::pending("1/3 pods ready").to_string(), "pending (1/3 pods ready)");
        assert_eq!(ResourceState::failed("boom").to_string(), "failed: boom");
    }

    #[test]
    fn test_state_serialize() {
        let json = serde_json::to_string(&ResourceState::Ready).unwrap();
        assert_eq!(json, r#"{"state":"ready"}"#);
    }
}
