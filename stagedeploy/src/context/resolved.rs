//! Append-only resolved configuration.

use crate::errors::ConfigConflictError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Endpoint values contributed by stages, keyed `<stage>.<key>`.
///
/// Once written, a key cannot be overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedConfig {
    entries: BTreeMap<String, String>,
}

impl ResolvedConfig {
    /// Creates an empty config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the qualified key for a stage's endpoint.
    #[must_use]
    pub fn qualified_key(stage: &str, key: &str) -> String {
        format!("{stage}.{key}")
    }

    /// Adds a value for `stage.key`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigConflictError` if the key already exists.
    pub fn insert(
        &mut self,
        stage: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), ConfigConflictError> {
        let qualified = Self::qualified_key(stage, key);
        if self.entries.contains_key(&qualified) {
            return Err(ConfigConflictError::new(qualified));
        }
        self.entries.insert(qualified, value.into());
        Ok(())
    }

    /// Returns the value for `stage.key`.
    #[must_use]
    pub fn get(&self, stage: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&Self::qualified_key(stage, key))
            .map(String::as_str)
    }

    /// Merges another config into this one.
    ///
    /// Either every key is added or none is.
    ///
    /// # Errors
    ///
    /// Returns `ConfigConflictError` for the first key already present.
    pub fn merge(&mut self, other: &Self) -> Result<(), ConfigConflictError> {
        if let Some(existing) = other.entries.keys().find(|k| self.entries.contains_key(*k)) {
            return Err(ConfigConflictError::new(existing.clone()));
        }
        self.entries
            .extend(other.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    /// Iterates over qualified keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut config = ResolvedConfig::new();
        config
            .insert("broker", "broker-address", "redpanda-cluster.default.svc.cluster.local:9093")
            .unwrap();

        assert_eq!(
            config.get("broker", "broker-address"),
            Some("redpanda-cluster.default.svc.cluster.local:9093")
        );
        assert!(config.get("database", "broker-address").is_none());
    }

    #[test]
    fn test_insert_conflict() {
        let mut config = ResolvedConfig::new();
        config.insert("broker", "broker-address", "a:1").unwrap();

        let err = config.insert("broker", "broker-address", "b:2").unwrap_err();
        assert_eq!(err.key, "broker.broker-address");
        assert_eq!(config.get("broker", "broker-address"), Some("a:1"));
    }

    #[test]
    fn test_same_key_different_stages() {
        let mut config = ResolvedConfig::new();
        config.insert("broker", "namespace", "default").unwrap();
        config.insert("database", "namespace", "voltdb").unwrap();
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let mut run = ResolvedConfig::new();
        run.insert("broker", "broker-address", "a:1").unwrap();

        let mut stage = ResolvedConfig::new();
        stage.insert("broker", "pipeline-name", "x").unwrap();
        stage.insert("broker", "broker-address", "b:2").unwrap();

        assert!(run.merge(&stage).is_err());
        assert_eq!(run.len(), 1);
        assert!(run.get("broker", "pipeline-name").is_none());
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let mut config = ResolvedConfig::new();
        config.insert("cluster", "kube-context", "gke_p_z_n").unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, serde_json::json!({"cluster.kube-context": "gke_p_z_n"}));
    }
}
