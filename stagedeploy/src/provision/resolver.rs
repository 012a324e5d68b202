//! Deterministic address resolution.
//!
//! Addresses are computed from resource identity alone. No network calls.

use crate::context::ResolvedConfig;
use crate::core::ResourceId;
use crate::errors::ConfigConflictError;
use serde::Serialize;

/// Broker bootstrap address.
pub const BROKER_ADDRESS: &str = "broker-address";
/// Database client address.
pub const DATABASE_CLIENT_ADDRESS: &str = "database-client-address";
/// Kube context of the cluster.
pub const KUBE_CONTEXT: &str = "kube-context";
/// Namespace the component was installed into.
pub const NAMESPACE: &str = "namespace";
/// Name of the release.
pub const RELEASE_NAME: &str = "release-name";
/// Name of the batch job.
pub const JOB_NAME: &str = "job-name";

/// A value a stage contributes to the resolved config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Endpoint {
    /// `<name>[-<component>].<namespace>.svc.cluster.local:<port>`.
    Service {
        /// Resolved config key.
        key: &'static str,
        /// Service name suffix appended to the release name.
        component: Option<&'static str>,
        /// Service port.
        port: u16,
    },
    /// `gke_<project>_<zone>_<name>` for a cluster.
    KubeContext {
        /// Resolved config key.
        key: &'static str,
    },
    /// The resource name.
    ResourceName {
        /// Resolved config key.
        key: &'static str,
    },
    /// The resource namespace.
    Namespace {
        /// Resolved config key.
        key: &'static str,
    },
}

impl Endpoint {
    /// Returns the resolved config key.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Service { key, .. }
            | Self::KubeContext { key }
            | Self::ResourceName { key }
            | Self::Namespace { key } => key,
        }
    }

    /// Computes the value for `resource`, if the resource has the needed scope.
    #[must_use]
    pub fn value_for(&self, resource: &ResourceId) -> Option<String> {
        match self {
            Self::Service {
                component, port, ..
            } => ConfigResolver::service_address(resource, *component, *port),
            Self::KubeContext { .. } => ConfigResolver::kube_context(resource),
            Self::ResourceName { .. } => Some(resource.name.clone()),
            Self::Namespace { .. } => resource.namespace().map(str::to_string),
        }
    }
}

/// Turns resource identity into endpoint values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigResolver;

impl ConfigResolver {
    /// Resolves every endpoint a stage contributes.
    ///
    /// Endpoints that do not apply to the resource's scope are left out.
    ///
    /// # Errors
    ///
    /// `ConfigConflictError` if two endpoints share a key.
    pub fn resolve(
        stage_name: &str,
        resource: &ResourceId,
        endpoints: &[Endpoint],
    ) -> Result<ResolvedConfig, ConfigConflictError> {
        let mut config = ResolvedConfig::new();
        for endpoint in endpoints {
            if let Some(value) = endpoint.value_for(resource) {
                config.insert(stage_name, endpoint.key(), value)?;
            }
        }
        Ok(config)
    }

    /// In-cluster DNS address of a release's service.
    #[must_use]
    pub fn service_address(resource: &ResourceId, component: Option<&str>, port: u16) -> Option<String> {
        let namespace = resource.namespace()?;
        let service = match component {
            Some(component) => format!("{}-{component}", resource.name),
            None => resource.name.clone(),
        };
        Some(format!("{service}.{namespace}.svc.cluster.local:{port}"))
    }

    /// kubectl context name for a managed cluster.
    #[must_use]
    pub fn kube_context(resource: &ResourceId) -> Option<String> {
        let (project, zone) = resource.zone()?;
        Some(format!("gke_{project}_{zone}_{}", resource.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DATABASE_ENDPOINTS: [Endpoint; 2] = [
        Endpoint::Service {
            key: DATABASE_CLIENT_ADDRESS,
            component: Some("voltdb-cluster-client"),
            port: 21212,
        },
        Endpoint::Namespace { key: NAMESPACE },
    ];

    #[test]
    fn test_database_client_address() {
        let resource = ResourceId::release("voltdb", "volt-vwap");
        let config = ConfigResolver::resolve("database", &resource, &DATABASE_ENDPOINTS).unwrap();

        assert_eq!(
            config.get("database", DATABASE_CLIENT_ADDRESS),
            Some("volt-vwap-voltdb-cluster-client.voltdb.svc.cluster.local:21212")
        );
        assert_eq!(config.get("database", NAMESPACE), Some("voltdb"));
    }

    #[test]
    fn test_broker_address_without_component() {
        let resource = ResourceId::release("default", "redpanda-cluster");
        let address = ConfigResolver::service_address(&resource, None, 9093);
        assert_eq!(
            address.as_deref(),
            Some("redpanda-cluster.default.svc.cluster.local:9093")
        );
    }

    #[test]
    fn test_kube_context() {
        let resource = ResourceId::cluster("demo-project", "asia-northeast1-b", "voltsp");
        assert_eq!(
            ConfigResolver::kube_context(&resource).as_deref(),
            Some("gke_demo-project_asia-northeast1-b_voltsp")
        );
        assert!(ConfigResolver::service_address(&resource, None, 80).is_none());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resource = ResourceId::release("voltdb", "volt-vwap");
        let first = ConfigResolver::resolve("database", &resource, &DATABASE_ENDPOINTS).unwrap();
        let second = ConfigResolver::resolve("database", &resource, &DATABASE_ENDPOINTS).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_endpoint_keys_conflict() {
        let resource = ResourceId::release("voltdb", "volt-vwap");
        let endpoints = [
            Endpoint::ResourceName { key: RELEASE_NAME },
            Endpoint::Namespace { key: RELEASE_NAME },
        ];
        let err = ConfigResolver::resolve("database", &resource, &endpoints).unwrap_err();
        assert_eq!(err.key, "database.release-name");
    }
}
