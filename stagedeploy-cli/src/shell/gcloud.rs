//! GKE clusters through `gcloud`.

use super::{args, Shell};
use async_trait::async_trait;
use serde_json::Value;
use stagedeploy::adapters::{AdapterResult, ClusterAdapter, ClusterSpec};
use stagedeploy::core::ResourceState;
use stagedeploy::errors::AdapterError;

const GCLOUD: &str = "gcloud";

/// Cluster lifecycle via `gcloud container clusters`.
#[derive(Debug, Clone, Copy)]
pub struct Gcloud {
    shell: Shell,
}

impl Gcloud {
    /// Creates the adapter.
    #[must_use]
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }
}

/// Maps a cluster's `status` field.
fn cluster_state(describe: &Value) -> ResourceState {
    match describe.get("status").and_then(Value::as_str) {
        Some("RUNNING") => ResourceState::Ready,
        Some(status @ ("PROVISIONING" | "RECONCILING" | "STOPPING")) => ResourceState::pending(status),
        Some(status @ ("ERROR" | "DEGRADED")) => {
            let message = describe
                .get("statusMessage")
                .and_then(Value::as_str)
                .unwrap_or(status);
            ResourceState::failed(message)
        }
        Some(other) => ResourceState::pending(other),
        None => ResourceState::pending("status unknown"),
    }
}

#[async_trait]
impl ClusterAdapter for Gcloud {
    async fn cluster_exists(&self, project: &str, zone: &str, name: &str) -> AdapterResult<bool> {
        let stdout = self
            .shell
            .run(
                GCLOUD,
                &args![
                    "container",
                    "clusters",
                    "list",
                    "--project",
                    project,
                    format!("--filter=name={name} AND zone={zone}"),
                    "--format=value(name)",
                ],
                None,
            )
            .await?;
        Ok(stdout.lines().any(|line| line.trim() == name))
    }

    async fn cluster_status(&self, project: &str, zone: &str, name: &str) -> AdapterResult<ResourceState> {
        let args = args![
            "container", "clusters", "describe", name, "--zone", zone, "--project", project,
            "--format=json",
        ];
        let output = self.shell.output(GCLOUD, &args, None).await?;
        if !output.success {
            if output.stderr.contains("NOT_FOUND") || output.stderr.contains("was not found") {
                return Ok(ResourceState::Absent);
            }
            return Err(AdapterError::new("gcloud container clusters describe", output.diagnostic()));
        }
        let describe: Value = serde_json::from_str(&output.stdout)
            .map_err(|e| AdapterError::new("gcloud container clusters describe", e.to_string()))?;
        Ok(cluster_state(&describe))
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> AdapterResult<()> {
        self.shell
            .run(
                GCLOUD,
                &args![
                    "container",
                    "clusters",
                    "create",
                    spec.name,
                    "--project",
                    spec.project,
                    "--zone",
                    spec.zone,
                    "--cluster-version",
                    spec.version,
                    "--num-nodes",
                    spec.node_count,
                    "--machine-type",
                    spec.machine_type,
                    "--disk-size",
                    spec.disk_size_gb,
                    "--disk-type",
                    spec.disk_type,
                    "--enable-ip-alias",
                    "--node-locations",
                    spec.zone,
                    "--async",
                ],
                None,
            )
            .await?;
        Ok(())
    }

    async fn fetch_credentials(&self, project: &str, zone: &str, name: &str) -> AdapterResult<()> {
        self.shell
            .run(
                GCLOUD,
                &args![
                    "container", "clusters", "get-credentials", name, "--zone", zone, "--project",
                    project,
                ],
                None,
            )
            .await?;
        Ok(())
    }

    async fn delete_cluster(&self, project: &str, zone: &str, name: &str) -> AdapterResult<()> {
        self.shell
            .run(
                GCLOUD,
                &args![
                    "container", "clusters", "delete", name, "--zone", zone, "--project", project,
                    "--quiet",
                ],
                None,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cluster_state() {
        assert_eq!(cluster_state(&json!({ "status": "RUNNING" })), ResourceState::Ready);
        assert_eq!(
            cluster_state(&json!({ "status": "PROVISIONING" })),
            ResourceState::pending("PROVISIONING")
        );
        assert_eq!(
            cluster_state(&json!({ "status": "ERROR", "statusMessage": "quota exceeded" })),
            ResourceState::failed("quota exceeded")
        );
        assert!(!cluster_state(&json!({})).is_terminal());
    }
}
