//! Cluster objects through `kubectl`.

use super::{args, Shell};
use async_trait::async_trait;
use serde_json::{json, Value};
use stagedeploy::adapters::{AdapterResult, KubeAdapter, Manifest, PodSummary, SecretData, SecretPresence};
use stagedeploy::errors::AdapterError;
use stagedeploy::provision::secrets::FINGERPRINT_ANNOTATION;

const KUBECTL: &str = "kubectl";
const BROKEN_WAIT_REASONS: [&str; 4] = [
    "CrashLoopBackOff",
    "ImagePullBackOff",
    "ErrImagePull",
    "CreateContainerConfigError",
];

/// Namespaces, manifests, pods and secrets via `kubectl`.
#[derive(Debug, Clone, Copy)]
pub struct Kubectl {
    shell: Shell,
}

impl Kubectl {
    /// Creates the adapter.
    #[must_use]
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }

    async fn write_secret(&self, verb: &str, namespace: &str, name: &str, data: &SecretData) -> AdapterResult<()> {
        let document = secret_manifest(namespace, name, data)
            .to_yaml()
            .map_err(|e| AdapterError::new(format!("kubectl {verb} secret"), e.diagnostic))?;
        self.shell
            .run(KUBECTL, &args![verb, "-f", "-"], Some(&document))
            .await?;
        Ok(())
    }
}

fn secret_manifest(namespace: &str, name: &str, data: &SecretData) -> Manifest {
    Manifest(json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "type": data.secret_type,
        "metadata": {
            "name": name,
            "namespace": namespace,
            "annotations": data.annotations,
        },
        "stringData": data.data,
    }))
}

fn pod_is_ready(pod: &Value) -> bool {
    pod.pointer("/status/conditions")
        .and_then(Value::as_array)
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c["type"] == "Ready" && c["status"] == "True")
        })
}

fn pod_is_broken(pod: &Value) -> bool {
    if pod.pointer("/status/phase").and_then(Value::as_str) == Some("Failed") {
        return true;
    }
    pod.pointer("/status/containerStatuses")
        .and_then(Value::as_array)
        .is_some_and(|statuses| {
            statuses.iter().any(|s| {
                s.pointer("/state/waiting/reason")
                    .and_then(Value::as_str)
                    .is_some_and(|reason| BROKEN_WAIT_REASONS.contains(&reason))
            })
        })
}

/// Counts pods in a `kubectl get pods -o json` list.
fn summarize_pods(list: &Value) -> PodSummary {
    let pods = list["items"].as_array().map_or(&[][..], Vec::as_slice);
    let mut summary = PodSummary::default();
    for pod in pods {
        summary.total += 1;
        let phase = pod.pointer("/status/phase").and_then(Value::as_str);
        if pod_is_broken(pod) {
            summary.failed += 1;
        } else if phase == Some("Succeeded") {
            summary.succeeded += 1;
        } else if phase == Some("Running") && pod_is_ready(pod) {
            summary.ready += 1;
        }
    }
    summary
}

fn parse_json(operation: &str, stdout: &str) -> AdapterResult<Value> {
    serde_json::from_str(stdout).map_err(|e| AdapterError::new(operation, e.to_string()))
}

#[async_trait]
impl KubeAdapter for Kubectl {
    async fn namespace_exists(&self, namespace: &str) -> AdapterResult<bool> {
        let stdout = self
            .shell
            .run(
                KUBECTL,
                &args!["get", "namespace", namespace, "--ignore-not-found", "-o", "name"],
                None,
            )
            .await?;
        Ok(!stdout.trim().is_empty())
    }

    async fn create_namespace(&self, namespace: &str) -> AdapterResult<()> {
        let output = self
            .shell
            .output(KUBECTL, &args!["create", "namespace", namespace], None)
            .await?;
        if output.success || output.stderr.contains("AlreadyExists") {
            Ok(())
        } else {
            Err(AdapterError::new("kubectl create namespace", output.diagnostic()))
        }
    }

    async fn apply_manifest(&self, manifest: &Manifest) -> AdapterResult<()> {
        let document = manifest.to_yaml()?;
        self.shell
            .run(KUBECTL, &args!["apply", "-f", "-"], Some(&document))
            .await?;
        Ok(())
    }

    async fn object_exists(&self, namespace: &str, kind: &str, name: &str) -> AdapterResult<bool> {
        let stdout = self
            .shell
            .run(
                KUBECTL,
                &args!["get", kind, name, "-n", namespace, "--ignore-not-found", "-o", "name"],
                None,
            )
            .await?;
        Ok(!stdout.trim().is_empty())
    }

    async fn delete_object(&self, namespace: &str, kind: &str, name: &str) -> AdapterResult<()> {
        self.shell
            .run(
                KUBECTL,
                &args!["delete", kind, name, "-n", namespace, "--ignore-not-found"],
                None,
            )
            .await?;
        Ok(())
    }

    async fn pods_ready(&self, namespace: &str, selector: &str) -> AdapterResult<PodSummary> {
        let stdout = self
            .shell
            .run(
                KUBECTL,
                &args!["get", "pods", "-n", namespace, "-l", selector, "-o", "json"],
                None,
            )
            .await?;
        Ok(summarize_pods(&parse_json("kubectl get pods", &stdout)?))
    }

    async fn secret_state(&self, namespace: &str, name: &str) -> AdapterResult<SecretPresence> {
        let stdout = self
            .shell
            .run(
                KUBECTL,
                &args!["get", "secret", name, "-n", namespace, "--ignore-not-found", "-o", "json"],
                None,
            )
            .await?;
        if stdout.trim().is_empty() {
            return Ok(SecretPresence::Absent);
        }
        let secret = parse_json("kubectl get secret", &stdout)?;
        let fingerprint = secret
            .pointer("/metadata/annotations")
            .and_then(|a| a.get(FINGERPRINT_ANNOTATION))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(SecretPresence::Present { fingerprint })
    }

    async fn create_secret(&self, namespace: &str, name: &str, data: &SecretData) -> AdapterResult<()> {
        self.write_secret("create", namespace, name, data).await
    }

    async fn replace_secret(&self, namespace: &str, name: &str, data: &SecretData) -> AdapterResult<()> {
        self.write_secret("replace", namespace, name, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn pod(phase: &str, ready: bool) -> Value {
        let status = if ready { "True" } else { "False" };
        json!({
            "status": {
                "phase": phase,
                "conditions": [{ "type": "Ready", "status": status }],
            }
        })
    }

    #[test]
    fn test_summarize_pods() {
        let crash = json!({
            "status": {
                "phase": "Running",
                "containerStatuses": [{ "state": { "waiting": { "reason": "CrashLoopBackOff" } } }],
            }
        });
        let list = json!({
            "items": [pod("Running", true), pod("Running", false), pod("Succeeded", false), crash]
        });

        assert_eq!(
            summarize_pods(&list),
            PodSummary {
                total: 4,
                ready: 1,
                succeeded: 1,
                failed: 1,
            }
        );
        assert_eq!(summarize_pods(&json!({ "items": [] })), PodSummary::default());
    }

    #[test]
    fn test_secret_manifest_uses_string_data() {
        let data = SecretData {
            secret_type: "kubernetes.io/dockerconfigjson".to_string(),
            data: BTreeMap::from([(".dockerconfigjson".to_string(), "{}".to_string())]),
            annotations: BTreeMap::from([(FINGERPRINT_ANNOTATION.to_string(), "abc".to_string())]),
        };

        let manifest = secret_manifest("voltdb", "dockerio-registry", &data);

        assert_eq!(manifest.kind(), Some("Secret"));
        assert_eq!(manifest.namespace(), Some("voltdb"));
        assert_eq!(manifest.0["stringData"][".dockerconfigjson"], "{}");
        assert_eq!(manifest.0["metadata"]["annotations"][FINGERPRINT_ANNOTATION], "abc");
    }
}
