//! Registry credential secrets.
//!
//! Secrets are rendered as `kubernetes.io/dockerconfigjson` and annotated
//! with a SHA-256 fingerprint of the rendered payload, so an unchanged
//! credential is never rewritten and a changed one is replaced in place.

use crate::adapters::{KubeAdapter, SecretData, SecretPresence};
use crate::errors::{AdapterError, DeployError, DeployResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Annotation holding the credential fingerprint.
pub const FINGERPRINT_ANNOTATION: &str = "stagedeploy.io/credential-fingerprint";

const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";
const DOCKER_CONFIG_TYPE: &str = "kubernetes.io/dockerconfigjson";
const REDACTED: &str = "[REDACTED]";

/// Image registry credentials. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    /// Registry server.
    #[serde(default = "default_server")]
    pub server: String,
    /// Registry user.
    pub username: String,
    /// Registry password or access token.
    pub password: String,
    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
}

fn default_server() -> String {
    "docker.io".to_string()
}

impl RegistryCredentials {
    /// Creates credentials for the default registry.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server: default_server(),
            username: username.into(),
            password: password.into(),
            email: None,
        }
    }

    /// Sets the account email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the registry server.
    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    fn auth_token(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }

    fn docker_config(&self) -> String {
        let mut entry = serde_json::json!({
            "username": self.username,
            "password": self.password,
            "auth": self.auth_token(),
        });
        if let Some(email) = &self.email {
            entry["email"] = serde_json::Value::String(email.clone());
        }
        serde_json::json!({ "auths": { self.server.clone(): entry } }).to_string()
    }

    /// Returns the hex SHA-256 of the rendered registry config.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.docker_config().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Renders the secret payload.
    #[must_use]
    pub fn render(&self) -> SecretData {
        SecretData {
            secret_type: DOCKER_CONFIG_TYPE.to_string(),
            data: BTreeMap::from([(DOCKER_CONFIG_KEY.to_string(), self.docker_config())]),
            annotations: BTreeMap::from([(FINGERPRINT_ANNOTATION.to_string(), self.fingerprint())]),
        }
    }

    /// Removes every encoding of the credential from `text`.
    #[must_use]
    pub fn scrub(&self, text: &str) -> String {
        let config = self.docker_config();
        let secrets = [
            STANDARD.encode(&config),
            config,
            self.auth_token(),
            self.password.clone(),
        ];
        secrets
            .iter()
            .filter(|s| !s.is_empty())
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("email", &self.email)
            .finish()
    }
}

/// What `ensure_secret` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOutcome {
    /// The secret did not exist and was created.
    Created,
    /// The secret already carried the same credential.
    Unchanged,
    /// The secret existed with a different credential and was replaced.
    Rotated,
}

/// Creates or rotates registry secrets.
pub struct SecretProvisioner {
    kube: Arc<dyn KubeAdapter>,
}

impl SecretProvisioner {
    /// Creates a provisioner backed by `kube`.
    #[must_use]
    pub fn new(kube: Arc<dyn KubeAdapter>) -> Self {
        Self { kube }
    }

    /// Ensures `namespace/name` holds `credentials`.
    ///
    /// # Errors
    ///
    /// `DeployError::Secret` with a scrubbed diagnostic.
    pub async fn ensure_secret(
        &self,
        namespace: &str,
        name: &str,
        credentials: &RegistryCredentials,
    ) -> DeployResult<SecretOutcome> {
        let fail = |err: AdapterError| DeployError::Secret {
            namespace: namespace.to_string(),
            name: name.to_string(),
            diagnostic: credentials.scrub(&err.to_string()),
        };

        let fingerprint = credentials.fingerprint();
        let outcome = match self.kube.secret_state(namespace, name).await.map_err(fail)? {
            SecretPresence::Present {
                fingerprint: Some(existing),
            } if existing == fingerprint => SecretOutcome::Unchanged,
            SecretPresence::Present { .. } => {
                self.kube
                    .replace_secret(namespace, name, &credentials.render())
                    .await
                    .map_err(fail)?;
                SecretOutcome::Rotated
            }
            SecretPresence::Absent => {
                self.kube
                    .create_secret(namespace, name, &credentials.render())
                    .await
                    .map_err(fail)?;
                SecretOutcome::Created
            }
        };

        info!(
            namespace = %namespace,
            secret = %name,
            server = %credentials.server,
            outcome = ?outcome,
            "Registry secret ensured"
        );
        Ok(outcome)
    }
}
