//! Values passed across the adapter boundary.

use crate::errors::AdapterError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Parameters for creating a managed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cloud project ID.
    pub project: String,
    /// Compute zone.
    pub zone: String,
    /// Cluster name.
    pub name: String,
    /// Kubernetes version.
    pub version: String,
    /// Node machine type.
    pub machine_type: String,
    /// Number of nodes.
    pub node_count: u32,
    /// Node boot disk type.
    pub disk_type: String,
    /// Node boot disk size in GB.
    pub disk_size_gb: u32,
}

/// A Helm chart repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRepository {
    /// Local alias (e.g. "redpanda").
    pub name: String,
    /// Repository URL.
    pub url: String,
}

/// A chart reference with an optional pinned version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRef {
    /// Chart reference (e.g. "redpanda/redpanda").
    pub chart: String,
    /// Chart version, if pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ChartRef {
    /// Creates a chart reference.
    #[must_use]
    pub fn new(chart: impl Into<String>, version: Option<String>) -> Self {
        Self {
            chart: chart.into(),
            version,
        }
    }
}

/// Structured release values.
///
/// `values` becomes the values document; each `files` entry is a dotted key
/// whose value is read from a local file by the release tool.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseValues {
    /// Nested values document.
    pub values: Value,
    /// Dotted key to local file.
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
}

impl ReleaseValues {
    /// Creates an empty values document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Value::Object(serde_json::Map::new()),
            files: BTreeMap::new(),
        }
    }

    /// Sets a value at a dotted path, creating intermediate objects.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        insert_path(&mut self.values, path, value.into());
        self
    }

    /// Reads a key's value from a local file at install time.
    #[must_use]
    pub fn set_file(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(key.into(), path.into());
        self
    }

    /// Returns the value at a dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.values, |cursor, segment| cursor.get(segment))
    }
}

fn insert_path(root: &mut Value, path: &str, value: Value) {
    let mut cursor = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !cursor.is_object() {
            *cursor = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = ({ cursor }) else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

/// A Kubernetes object document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(pub Value);

impl Manifest {
    /// Parses a single YAML document.
    pub fn from_yaml_str(source: &str) -> Result<Self, AdapterError> {
        let value: Value = serde_yaml::from_str(source)
            .map_err(|e| AdapterError::new("parse manifest", e.to_string()))?;
        if !value.is_object() {
            return Err(AdapterError::new(
                "parse manifest",
                "document is not a mapping",
            ));
        }
        Ok(Self(value))
    }

    /// Builds a ConfigMap.
    #[must_use]
    pub fn config_map(namespace: &str, name: &str, data: &BTreeMap<String, String>) -> Self {
        Self(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": name, "namespace": namespace },
            "data": data,
        }))
    }

    /// Overrides `metadata.namespace`.
    #[must_use]
    pub fn with_namespace(self, namespace: &str) -> Self {
        self.with_metadata("namespace", namespace)
    }

    /// Overrides `metadata.name`.
    #[must_use]
    pub fn with_name(self, name: &str) -> Self {
        self.with_metadata("name", name)
    }

    fn with_metadata(mut self, key: &str, value: &str) -> Self {
        if let Value::Object(root) = &mut self.0 {
            let metadata = root
                .entry("metadata")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(metadata) = metadata {
                metadata.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        self
    }

    /// Returns the object kind.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    /// Returns `metadata.name`.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.pointer("/metadata/name").and_then(Value::as_str)
    }

    /// Returns `metadata.namespace`.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.0.pointer("/metadata/namespace").and_then(Value::as_str)
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String, AdapterError> {
        serde_yaml::to_string(&self.0).map_err(|e| AdapterError::new("render manifest", e.to_string()))
    }
}

/// Pod counts for a label selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PodSummary {
    /// Pods matching the selector.
    pub total: u32,
    /// Running pods with a true `Ready` condition.
    pub ready: u32,
    /// Pods in phase `Succeeded`.
    pub succeeded: u32,
    /// Pods in phase `Failed` or crash-looping.
    pub failed: u32,
}

impl fmt::Display for PodSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} pods ready", self.ready, self.total)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// Whether a secret exists, and the credential fingerprint it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretPresence {
    /// No secret with that name.
    Absent,
    /// The secret exists.
    Present {
        /// The fingerprint annotation, if set.
        fingerprint: Option<String>,
    },
}

/// Secret payload. `Debug` never prints the data.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretData {
    /// Secret type (e.g. `kubernetes.io/dockerconfigjson`).
    pub secret_type: String,
    /// Key to plain-text value.
    pub data: BTreeMap<String, String>,
    /// Annotations set on the secret.
    pub annotations: BTreeMap<String, String>,
}

impl fmt::Debug for SecretData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretData")
            .field("secret_type", &self.secret_type)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// Where to run database statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConnection {
    /// Namespace of the database pods.
    pub namespace: String,
    /// Pod to execute in.
    pub pod: String,
    /// In-cluster client address.
    pub address: String,
}

/// Rows returned by a statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatementOutput {
    /// Rows as string columns.
    pub rows: Vec<Vec<String>>,
}

impl StatementOutput {
    /// Returns the first column of the first row.
    #[must_use]
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first().and_then(|row| row.first()).map(String::as_str)
    }
}

/// Where to run topic administration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerEndpoint {
    /// Broker namespace.
    pub namespace: String,
    /// Broker pod to execute in.
    pub pod: String,
    /// In-cluster bootstrap address.
    pub address: String,
}

/// A topic to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    /// Topic name.
    pub name: String,
    /// Partition count.
    pub partitions: u32,
    /// Replication factor.
    pub replicas: u32,
    /// Topic configuration overrides.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_release_values_set_nested() {
        let values = ReleaseValues::new()
            .set("statefulset.replicas", 3)
            .set("tls.enabled", false)
            .set("statefulset.name", "broker");

        assert_eq!(
            values.values,
            serde_json::json!({
                "statefulset": { "replicas": 3, "name": "broker" },
                "tls": { "enabled": false }
            })
        );
        assert_eq!(values.get("statefulset.replicas"), Some(&serde_json::json!(3)));
        assert!(values.get("statefulset.missing").is_none());
    }

    #[test]
    fn test_release_values_overwrites_scalar_with_object() {
        let values = ReleaseValues::new().set("a", 1).set("a.b", 2);
        assert_eq!(values.values, serde_json::json!({ "a": { "b": 2 } }));
    }

    #[test]
    fn test_manifest_namespace_override() {
        let manifest = Manifest::from_yaml_str(
            "apiVersion: batch/v1\nkind: Job\nmetadata:\n  name: vwap-loadgen\n  namespace: default\n",
        )
        .unwrap()
        .with_namespace("voltsp");

        assert_eq!(manifest.kind(), Some("Job"));
        assert_eq!(manifest.name(), Some("vwap-loadgen"));
        assert_eq!(manifest.namespace(), Some("voltsp"));
    }

    #[test]
    fn test_manifest_name_override_creates_metadata() {
        let manifest = Manifest::from_yaml_str("apiVersion: batch/v1\nkind: Job\n")
            .unwrap()
            .with_name("vwap-loadgen-run2");

        assert_eq!(manifest.name(), Some("vwap-loadgen-run2"));
        assert_eq!(manifest.namespace(), None);
    }

    #[test]
    fn test_manifest_rejects_scalar_document() {
        assert!(Manifest::from_yaml_str("just a string").is_err());
    }

    #[test]
    fn test_secret_data_debug_redacted() {
        let data = SecretData {
            secret_type: "Opaque".to_string(),
            data: BTreeMap::from([("password".to_string(), "hunter2".to_string())]),
            annotations: BTreeMap::new(),
        };
        let rendered = format!("{data:?}");
        assert!(rendered.contains("password"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_pod_summary_display() {
        let summary = PodSummary {
            total: 3,
            ready: 1,
            succeeded: 0,
            failed: 1,
        };
        assert_eq!(summary.to_string(), "1/3 pods ready, 1 failed");
    }
}
