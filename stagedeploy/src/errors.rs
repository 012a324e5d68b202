//! Error types for deployment orchestration.
//!
//! `PreconditionError` is raised by static validation before any external
//! system is touched. Every other failure is a `DeployError` attached to the
//! stage and resource it happened on.

use crate::core::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for stage-level results.
pub type DeployResult<T> = Result<T, DeployError>;

/// Metadata about a validation failure for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "DEPLOY-005-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when static validation of the stage sequence fails.
///
/// Always produced before any adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PreconditionError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PreconditionError {
    /// Creates a new precondition error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the stage dependencies.
#[derive(Debug, Clone, Error)]
#[error("Dependency cycle detected: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "DEPLOY-005-CYCLE",
            format!("Stage dependencies form a cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PreconditionError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Error raised when a resolved configuration key is written twice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Resolved config conflict: key '{key}' already exists")]
pub struct ConfigConflictError {
    /// The conflicting key.
    pub key: String,
}

impl ConfigConflictError {
    /// Creates a new config conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error raised when a stage reads configuration from a stage it did not
/// declare as a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Undeclared dependency: stage '{stage}' attempted to read from '{dependency}' which was not declared as a dependency")]
pub struct UndeclaredDependencyError {
    /// The stage attempting access.
    pub stage: String,
    /// The undeclared stage.
    pub dependency: String,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            dependency: dependency.into(),
        }
    }
}

/// Error returned by an external adapter.
///
/// `diagnostic` carries the underlying tool's output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation}: {diagnostic}")]
pub struct AdapterError {
    /// The operation that failed.
    pub operation: String,
    /// Diagnostic output from the external tool.
    pub diagnostic: String,
}

impl AdapterError {
    /// Creates a new adapter error.
    #[must_use]
    pub fn new(operation: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            diagnostic: diagnostic.into(),
        }
    }
}

/// A stage-level deployment failure.
#[derive(Debug, Clone, Error)]
pub enum DeployError {
    /// Static validation failed.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// The provisioning action was rejected.
    #[error("Provisioning {resource} failed: {diagnostic}")]
    Provisioning {
        /// The resource being provisioned.
        resource: ResourceId,
        /// Adapter diagnostic output.
        diagnostic: String,
    },

    /// The resource did not become ready in time.
    #[error("Timed out after {}s waiting for {resource} (last observed: {last_state})", waited.as_secs())]
    Timeout {
        /// The resource being waited on.
        resource: ResourceId,
        /// How long the waiter waited.
        waited: Duration,
        /// The last observed state or probe error.
        last_state: String,
    },

    /// The resource reported a failed state.
    #[error("{resource} reported failure: {reason}")]
    ReadinessFailed {
        /// The failed resource.
        resource: ResourceId,
        /// The reported failure.
        reason: String,
    },

    /// A post-condition check failed despite the resource being ready.
    #[error("Connectivity check against {resource} failed: {diagnostic}")]
    Connectivity {
        /// The resource checked.
        resource: ResourceId,
        /// Adapter diagnostic output.
        diagnostic: String,
    },

    /// Credential provisioning failed. Never includes the credential itself.
    #[error("Provisioning secret '{name}' in namespace '{namespace}' failed: {diagnostic}")]
    Secret {
        /// The secret namespace.
        namespace: String,
        /// The secret name.
        name: String,
        /// Scrubbed diagnostic output.
        diagnostic: String,
    },

    /// The operator interrupted the run at a safe point.
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// A stage read from an undeclared dependency.
    #[error("{0}")]
    UndeclaredDependency(#[from] UndeclaredDependencyError),

    /// A declared dependency did not contribute the expected key.
    #[error("Stage '{stage}' did not resolve '{key}'")]
    MissingEndpoint {
        /// The producing stage.
        stage: String,
        /// The expected key.
        key: String,
    },

    /// A stage tried to overwrite an existing resolved config key.
    #[error("{0}")]
    ConfigConflict(#[from] ConfigConflictError),
}

impl DeployError {
    /// Creates a provisioning error from an adapter failure.
    #[must_use]
    pub fn provisioning(resource: &ResourceId, err: AdapterError) -> Self {
        Self::Provisioning {
            resource: resource.clone(),
            diagnostic: err.to_string(),
        }
    }

    /// Creates a connectivity error from an adapter failure.
    #[must_use]
    pub fn connectivity(resource: &ResourceId, diagnostic: impl Into<String>) -> Self {
        Self::Connectivity {
            resource: resource.clone(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Returns a stable, machine-readable name for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition",
            Self::Provisioning { .. } => "provisioning",
            Self::Timeout { .. } => "timeout",
            Self::ReadinessFailed { .. } => "readiness_failed",
            Self::Connectivity { .. } => "connectivity",
            Self::Secret { .. } => "secret",
            Self::Cancelled { .. } => "cancelled",
            Self::UndeclaredDependency(_) => "undeclared_dependency",
            Self::MissingEndpoint { .. } => "missing_endpoint",
            Self::ConfigConflict(_) => "config_conflict",
        }
    }

    /// Returns true if the error is an operator cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
