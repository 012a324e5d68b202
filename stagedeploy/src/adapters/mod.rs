//! External system adapters.
//!
//! Each trait wraps one external tool: the cluster manager, the release
//! manager, the cluster object API, the database client and the topic admin
//! client. The orchestration core only talks to these traits; concrete
//! implementations live in the command-line crate and in [`crate::testing`].
//!
//! Query methods are read-only. Mutating methods are invoked at most once per
//! stage per run and only on the provisioning path or in post-conditions.

mod types;

use crate::core::ResourceState;
use crate::errors::AdapterError;
use async_trait::async_trait;
use std::sync::Arc;

pub use types::{
    BrokerEndpoint, ChartRef, ChartRepository, ClusterSpec, DbConnection, Manifest, PodSummary,
    ReleaseValues, SecretData, SecretPresence, StatementOutput, TopicSpec,
};

/// Result type returned by adapters.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Managed cluster lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    /// Returns true if the cluster exists.
    async fn cluster_exists(&self, project: &str, zone: &str, name: &str) -> AdapterResult<bool>;

    /// Returns the cluster's lifecycle state.
    async fn cluster_status(&self, project: &str, zone: &str, name: &str) -> AdapterResult<ResourceState>;

    /// Starts cluster creation. May return before the cluster is running.
    async fn create_cluster(&self, spec: &ClusterSpec) -> AdapterResult<()>;

    /// Fetches credentials for the cluster into the local kube config.
    async fn fetch_credentials(&self, project: &str, zone: &str, name: &str) -> AdapterResult<()>;

    /// Deletes the cluster.
    async fn delete_cluster(&self, project: &str, zone: &str, name: &str) -> AdapterResult<()>;
}

/// Helm-equivalent package releases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseAdapter: Send + Sync {
    /// Registers a chart repository. Already-registered is success.
    async fn add_repository(&self, repository: &ChartRepository) -> AdapterResult<()>;

    /// Returns true if the release exists.
    async fn release_exists(&self, namespace: &str, name: &str) -> AdapterResult<bool>;

    /// Installs the release, or upgrades it if it exists.
    async fn install_or_upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &ChartRef,
        values: &ReleaseValues,
    ) -> AdapterResult<()>;

    /// Returns the release state as reported by the release manager.
    async fn release_status(&self, namespace: &str, name: &str) -> AdapterResult<ResourceState>;

    /// Uninstalls the release.
    async fn uninstall(&self, namespace: &str, name: &str) -> AdapterResult<()>;
}

/// kubectl-equivalent object access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KubeAdapter: Send + Sync {
    /// Returns true if the namespace exists.
    async fn namespace_exists(&self, namespace: &str) -> AdapterResult<bool>;

    /// Creates the namespace.
    async fn create_namespace(&self, namespace: &str) -> AdapterResult<()>;

    /// Applies a manifest (create or update).
    async fn apply_manifest(&self, manifest: &Manifest) -> AdapterResult<()>;

    /// Returns true if an object of `kind` exists.
    async fn object_exists(&self, namespace: &str, kind: &str, name: &str) -> AdapterResult<bool>;

    /// Deletes an object of `kind`. Missing objects are not an error.
    async fn delete_object(&self, namespace: &str, kind: &str, name: &str) -> AdapterResult<()>;

    /// Counts pods matching a label selector.
    async fn pods_ready(&self, namespace: &str, selector: &str) -> AdapterResult<PodSummary>;

    /// Reports whether a secret exists and its fingerprint annotation.
    async fn secret_state(&self, namespace: &str, name: &str) -> AdapterResult<SecretPresence>;

    /// Creates a secret.
    async fn create_secret(&self, namespace: &str, name: &str, data: &SecretData) -> AdapterResult<()>;

    /// Replaces an existing secret in place.
    async fn replace_secret(&self, namespace: &str, name: &str, data: &SecretData) -> AdapterResult<()>;
}

/// Database client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Executes one SQL statement.
    async fn execute_statement(&self, connection: &DbConnection, sql: &str) -> AdapterResult<StatementOutput>;
}

/// Stream topic administration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicAdapter: Send + Sync {
    /// Returns true if the topic exists.
    async fn topic_exists(&self, broker: &BrokerEndpoint, topic: &str) -> AdapterResult<bool>;

    /// Creates the topic.
    async fn create_topic(&self, broker: &BrokerEndpoint, topic: &TopicSpec) -> AdapterResult<()>;

    /// Applies configuration overrides to the topic.
    async fn alter_topic_config(&self, broker: &BrokerEndpoint, topic: &TopicSpec) -> AdapterResult<()>;
}

/// The full set of adapters a run needs.
#[derive(Clone)]
pub struct Adapters {
    /// Cluster lifecycle.
    pub cluster: Arc<dyn ClusterAdapter>,
    /// Package releases.
    pub releases: Arc<dyn ReleaseAdapter>,
    /// Cluster objects.
    pub kube: Arc<dyn KubeAdapter>,
    /// Database client.
    pub database: Arc<dyn DatabaseAdapter>,
    /// Topic administration.
    pub topics: Arc<dyn TopicAdapter>,
}

impl Adapters {
    /// Uses one value for every adapter role.
    #[must_use]
    pub fn uniform<T>(adapter: Arc<T>) -> Self
    where
        T: ClusterAdapter + ReleaseAdapter + KubeAdapter + DatabaseAdapter + TopicAdapter + 'static,
    {
        Self {
            cluster: adapter.clone(),
            releases: adapter.clone(),
            kube: adapter.clone(),
            database: adapter.clone(),
            topics: adapter,
        }
    }
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters").finish_non_exhaustive()
    }
}
