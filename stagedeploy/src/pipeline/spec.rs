//! Stage specifications.

use crate::config::{
    BrokerConfig, ClusterConfig, DatabaseConfig, LoadGeneratorConfig, StreamProcessorConfig,
};
use crate::core::{ComponentKind, ResourceId};
use crate::provision::resolver::{BROKER_ADDRESS, DATABASE_CLIENT_ADDRESS};
use crate::provision::{Endpoint, RegistryCredentials, WaitPolicy};
use std::collections::BTreeSet;
use std::path::Path;

const BROKER: &str = ComponentKind::Broker.stage_name();
const DATABASE: &str = ComponentKind::Database.stage_name();

const CONSUMER_INPUTS: &[(&str, &str)] = &[
    (BROKER, BROKER_ADDRESS),
    (DATABASE, DATABASE_CLIENT_ADDRESS),
];

/// Operator-supplied parameters for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageParams {
    /// Cluster stage.
    Cluster(ClusterConfig),
    /// Broker stage.
    Broker(BrokerConfig),
    /// Database stage.
    Database(DatabaseConfig),
    /// Stream processor stage.
    StreamProcessor(StreamProcessorConfig),
    /// Load generator stage.
    LoadGenerator(LoadGeneratorConfig),
}

impl StageParams {
    /// Returns the component this stage provisions.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Cluster(_) => ComponentKind::Cluster,
            Self::Broker(_) => ComponentKind::Broker,
            Self::Database(_) => ComponentKind::Database,
            Self::StreamProcessor(_) => ComponentKind::StreamProcessor,
            Self::LoadGenerator(_) => ComponentKind::LoadGenerator,
        }
    }

    /// Returns the stage's target resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        match self {
            Self::Cluster(c) => c.resource(),
            Self::Broker(c) => c.resource(),
            Self::Database(c) => c.resource(),
            Self::StreamProcessor(c) => c.resource(),
            Self::LoadGenerator(c) => c.resource(),
        }
    }

    /// Returns the readiness wait policy.
    #[must_use]
    pub fn wait(&self) -> WaitPolicy {
        match self {
            Self::Cluster(c) => c.wait.policy(),
            Self::Broker(c) => c.wait.policy(),
            Self::Database(c) => c.wait.policy(),
            Self::StreamProcessor(c) => c.wait.policy(),
            Self::LoadGenerator(c) => c.wait.policy(),
        }
    }

    /// Returns the values the stage contributes on success.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        match self {
            Self::Cluster(c) => c.endpoints(),
            Self::Broker(c) => c.endpoints(),
            Self::Database(c) => c.endpoints(),
            Self::StreamProcessor(c) => c.endpoints(),
            Self::LoadGenerator(c) => c.endpoints(),
        }
    }

    /// Returns the `(stage, key)` pairs the stage reads from earlier stages.
    #[must_use]
    pub fn required_inputs(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::StreamProcessor(_) | Self::LoadGenerator(_) => CONSUMER_INPUTS,
            _ => &[],
        }
    }

    /// Returns the local files the stage reads.
    #[must_use]
    pub fn local_files(&self) -> Vec<(&'static str, &Path)> {
        match self {
            Self::Database(c) => vec![
                ("license_file", c.license_file.as_path()),
                ("ddl_file", c.ddl_file.as_path()),
                ("jar_file", c.jar_file.as_path()),
            ],
            Self::StreamProcessor(c) => vec![
                ("license_file", c.license_file.as_path()),
                ("jar_file", c.jar_file.as_path()),
            ],
            Self::LoadGenerator(c) => vec![("job_file", c.job_file.as_path())],
            Self::Cluster(_) | Self::Broker(_) => Vec::new(),
        }
    }

    /// Returns the local manifests the stage applies and the kind each must hold.
    #[must_use]
    pub fn manifest_files(&self) -> Vec<(&'static str, &Path, &'static str)> {
        match self {
            Self::LoadGenerator(c) => vec![("job_file", c.job_file.as_path(), LoadGeneratorConfig::JOB_KIND)],
            _ => Vec::new(),
        }
    }

    /// Returns the names that must be valid DNS-1123 labels.
    #[must_use]
    pub fn resource_names(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Cluster(c) => vec![("project", c.project.as_str()), ("name", c.name.as_str())],
            Self::Broker(c) => vec![
                ("namespace", c.namespace.as_str()),
                ("release", c.release.as_str()),
            ],
            Self::Database(c) => vec![
                ("namespace", c.namespace.as_str()),
                ("release", c.release.as_str()),
                ("registry_secret", c.registry_secret.as_str()),
            ],
            Self::StreamProcessor(c) => vec![
                ("namespace", c.namespace.as_str()),
                ("release", c.release.as_str()),
                ("registry_secret", c.registry_secret.as_str()),
            ],
            Self::LoadGenerator(c) => vec![
                ("namespace", c.namespace.as_str()),
                ("job_name", c.job_name.as_str()),
                ("config_map", c.config_map.as_str()),
            ],
        }
    }

    /// Returns the `(namespace, name)` of the image pull secret, if any.
    #[must_use]
    pub fn pull_secret(&self) -> Option<(&str, &str)> {
        match self {
            Self::Database(c) => Some((c.namespace.as_str(), c.registry_secret.as_str())),
            Self::StreamProcessor(c) => Some((c.namespace.as_str(), c.registry_secret.as_str())),
            _ => None,
        }
    }
}

/// Specification for one stage of a run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// Position in the run.
    pub ordinal: usize,
    /// Names of stages whose resolved config this stage reads.
    pub dependencies: BTreeSet<String>,
    /// Whether the stage runs.
    pub enabled: bool,
    /// Credentials for the stage's pull secret.
    pub registry: Option<RegistryCredentials>,
    /// Stage parameters.
    pub params: StageParams,
}

impl StageSpec {
    /// Creates an enabled stage named after its component.
    #[must_use]
    pub fn new(params: StageParams) -> Self {
        Self {
            name: params.kind().stage_name().to_string(),
            ordinal: 0,
            dependencies: BTreeSet::new(),
            enabled: true,
            registry: None,
            params,
        }
    }

    /// Renames the stage.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the ordinal position.
    #[must_use]
    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// Adds dependencies.
    #[must_use]
    pub fn depends_on(mut self, stages: &[&str]) -> Self {
        self.dependencies
            .extend(stages.iter().map(|s| (*s).to_string()));
        self
    }

    /// Enables or disables the stage.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the registry credentials.
    #[must_use]
    pub fn with_registry(mut self, registry: Option<RegistryCredentials>) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the component kind.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.params.kind()
    }

    /// Returns the target resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        self.params.resource()
    }
}
