//! Releases through `helm`.

use super::{args, Shell};
use async_trait::async_trait;
use serde_json::Value;
use stagedeploy::adapters::{AdapterResult, ChartRef, ChartRepository, ReleaseAdapter, ReleaseValues};
use stagedeploy::core::ResourceState;
use stagedeploy::errors::AdapterError;
use tracing::debug;

const HELM: &str = "helm";

/// Chart repositories and releases via `helm`.
#[derive(Debug, Clone, Copy)]
pub struct Helm {
    shell: Shell,
}

impl Helm {
    /// Creates the adapter.
    #[must_use]
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }
}

fn release_not_found(stderr: &str) -> bool {
    stderr.contains("release: not found")
}

/// Maps `helm status -o json` output.
fn release_state(status: &Value) -> ResourceState {
    match status.pointer("/info/status").and_then(Value::as_str) {
        Some("deployed") => ResourceState::Ready,
        Some("failed") => {
            let description = status
                .pointer("/info/description")
                .and_then(Value::as_str)
                .unwrap_or("release failed");
            ResourceState::failed(description)
        }
        Some("uninstalled") => ResourceState::Absent,
        Some(other) => ResourceState::pending(other),
        None => ResourceState::pending("status unknown"),
    }
}

/// Builds `upgrade --install` arguments. `values_file` holds the values document.
fn install_args(namespace: &str, name: &str, chart: &ChartRef, values: &ReleaseValues, values_file: &str) -> Vec<String> {
    let mut args = args!["upgrade", "--install", name, chart.chart, "-n", namespace, "-f", values_file];
    if let Some(version) = &chart.version {
        args.extend(args!["--version", version]);
    }
    for (key, path) in &values.files {
        args.extend(args!["--set-file", format!("{key}={}", path.display())]);
    }
    args
}

#[async_trait]
impl ReleaseAdapter for Helm {
    async fn add_repository(&self, repository: &ChartRepository) -> AdapterResult<()> {
        let output = self
            .shell
            .output(HELM, &args!["repo", "add", repository.name, repository.url], None)
            .await?;
        if !output.success && !output.stderr.contains("already exists") {
            return Err(AdapterError::new("helm repo add", output.diagnostic()));
        }
        self.shell
            .run(HELM, &args!["repo", "update", repository.name], None)
            .await?;
        Ok(())
    }

    async fn release_exists(&self, namespace: &str, name: &str) -> AdapterResult<bool> {
        let output = self
            .shell
            .output(HELM, &args!["status", name, "-n", namespace], None)
            .await?;
        if output.success {
            Ok(true)
        } else if release_not_found(&output.stderr) {
            Ok(false)
        } else {
            Err(AdapterError::new("helm status", output.diagnostic()))
        }
    }

    async fn install_or_upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &ChartRef,
        values: &ReleaseValues,
    ) -> AdapterResult<()> {
        let document = serde_yaml::to_string(&values.values)
            .map_err(|e| AdapterError::new("helm upgrade", e.to_string()))?;
        let file = tempfile::Builder::new()
            .prefix("stagedeploy-values-")
            .suffix(".yaml")
            .tempfile()
            .map_err(|e| AdapterError::new("helm upgrade", e.to_string()))?;
        tokio::fs::write(file.path(), document)
            .await
            .map_err(|e| AdapterError::new("helm upgrade", e.to_string()))?;
        debug!(release = name, values = %file.path().display(), "Wrote release values");

        let path = file.path().display().to_string();
        self.shell
            .run(HELM, &install_args(namespace, name, chart, values, &path), None)
            .await?;
        Ok(())
    }

    async fn release_status(&self, namespace: &str, name: &str) -> AdapterResult<ResourceState> {
        let output = self
            .shell
            .output(HELM, &args!["status", name, "-n", namespace, "-o", "json"], None)
            .await?;
        if !output.success {
            if release_not_found(&output.stderr) {
                return Ok(ResourceState::Absent);
            }
            return Err(AdapterError::new("helm status", output.diagnostic()));
        }
        let status: Value = serde_json::from_str(&output.stdout)
            .map_err(|e| AdapterError::new("helm status", e.to_string()))?;
        Ok(release_state(&status))
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> AdapterResult<()> {
        self.shell
            .run(HELM, &args!["uninstall", name, "-n", namespace], None)
            .await?;
        Ok(())
    }
}
