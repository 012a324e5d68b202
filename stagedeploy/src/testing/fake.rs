//! An in-memory environment implementing every adapter.
//!
//! Created resources converge after one `Pending` status poll. Every call is
//! logged; state-changing calls are also logged as mutations, which lets
//! tests assert that a rerun against a converged environment mutates nothing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::adapters::{
    AdapterResult, BrokerEndpoint, ChartRef, ChartRepository, ClusterAdapter, ClusterSpec,
    DatabaseAdapter, DbConnection, KubeAdapter, Manifest, PodSummary, ReleaseAdapter,
    ReleaseValues, SecretData, SecretPresence, StatementOutput, TopicAdapter, TopicSpec,
};
use crate::core::ResourceState;
use crate::errors::AdapterError;
use crate::provision::secrets::FINGERPRINT_ANNOTATION;

const POD_COUNT: u32 = 3;

#[derive(Debug, Default)]
struct State {
    /// Cluster name to pending polls left.
    clusters: HashMap<String, u32>,
    namespaces: BTreeSet<String>,
    repositories: BTreeSet<String>,
    /// `(namespace, release)` to pending polls left.
    releases: HashMap<(String, String), u32>,
    failed_releases: HashMap<String, String>,
    /// `(namespace, kind, name)`.
    objects: BTreeSet<(String, String, String)>,
    secrets: HashMap<(String, String), SecretData>,
    topics: BTreeMap<String, TopicSpec>,
    tables: HashMap<String, Vec<String>>,
    statement_failure: Option<String>,
    statements: Vec<String>,
    calls: Vec<String>,
    mutations: Vec<String>,
}

impl State {
    fn call(&mut self, entry: String) {
        self.calls.push(entry);
    }

    fn mutate(&mut self, entry: String) {
        self.calls.push(entry.clone());
        self.mutations.push(entry);
    }
}

/// A fake cluster, release manager, object API, database and broker.
#[derive(Debug, Default)]
pub struct FakeEnvironment {
    state: Mutex<State>,
}

impl FakeEnvironment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every database statement fail with `diagnostic`.
    pub fn fail_statements(&self, diagnostic: impl Into<String>) {
        self.state.lock().statement_failure = Some(diagnostic.into());
    }

    /// Makes the release named `name` report a failed status.
    pub fn fail_release(&self, name: impl Into<String>, reason: impl Into<String>) {
        self.state
            .lock()
            .failed_releases
            .insert(name.into(), reason.into());
    }

    /// Returns state-changing calls in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().mutations.clone()
    }

    /// Returns every call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Returns executed SQL statements in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Returns true if the namespace exists.
    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state.lock().namespaces.contains(namespace)
    }

    /// Returns true if the secret exists.
    #[must_use]
    pub fn has_secret(&self, namespace: &str, name: &str) -> bool {
        self.state
            .lock()
            .secrets
            .contains_key(&(namespace.to_string(), name.to_string()))
    }
}

fn converge(pending: &mut u32) -> ResourceState {
    if *pending > 0 {
        *pending -= 1;
        ResourceState::pending("deploying")
    } else {
        ResourceState::Ready
    }
}

#[async_trait]
impl ClusterAdapter for FakeEnvironment {
    async fn cluster_exists(&self, _project: &str, _zone: &str, name: &str) -> AdapterResult<bool> {
        let mut state = self.state.lock();
        state.call(format!("cluster_exists {name}"));
        Ok(state.clusters.contains_key(name))
    }

    async fn cluster_status(&self, _project: &str, _zone: &str, name: &str) -> AdapterResult<ResourceState> {
        let mut state = self.state.lock();
        state.call(format!("cluster_status {name}"));
        Ok(state
            .clusters
            .get_mut(name)
            .map_or(ResourceState::Absent, converge))
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("create_cluster {}", spec.name));
        state.clusters.insert(spec.name.clone(), 1);
        Ok(())
    }

    async fn fetch_credentials(&self, _project: &str, _zone: &str, name: &str) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.call(format!("fetch_credentials {name}"));
        if state.clusters.contains_key(name) {
            Ok(())
        } else {
            Err(AdapterError::new(
                "get-credentials",
                format!("cluster {name} not found"),
            ))
        }
    }

    async fn delete_cluster(&self, _project: &str, _zone: &str, name: &str) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("delete_cluster {name}"));
        state.clusters.remove(name);
        Ok(())
    }
}

#[async_trait]
impl ReleaseAdapter for FakeEnvironment {
    async fn add_repository(&self, repository: &ChartRepository) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("add_repository {}", repository.name));
        state.repositories.insert(repository.name.clone());
        Ok(())
    }

    async fn release_exists(&self, namespace: &str, name: &str) -> AdapterResult<bool> {
        let mut state = self.state.lock();
        state.call(format!("release_exists {namespace}/{name}"));
        Ok(state
            .releases
            .contains_key(&(namespace.to_string(), name.to_string())))
    }

    async fn install_or_upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &ChartRef,
        _values: &ReleaseValues,
    ) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("install_or_upgrade {namespace}/{name}"));
        let repo = chart.chart.split('/').next().unwrap_or_default();
        if !state.repositories.contains(repo) {
            return Err(AdapterError::new(
                "helm install",
                format!("repo {repo} not found"),
            ));
        }
        state
            .releases
            .insert((namespace.to_string(), name.to_string()), 1);
        Ok(())
    }

    async fn release_status(&self, namespace: &str, name: &str) -> AdapterResult<ResourceState> {
        let mut state = self.state.lock();
        state.call(format!("release_status {namespace}/{name}"));
        if let Some(reason) = state.failed_releases.get(name) {
            return Ok(ResourceState::failed(reason.clone()));
        }
        Ok(state
            .releases
            .get_mut(&(namespace.to_string(), name.to_string()))
            .map_or(ResourceState::Absent, converge))
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("uninstall {namespace}/{name}"));
        state
            .releases
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl KubeAdapter for FakeEnvironment {
    async fn namespace_exists(&self, namespace: &str) -> AdapterResult<bool> {
        let mut state = self.state.lock();
        state.call(format!("namespace_exists {namespace}"));
        Ok(state.namespaces.contains(namespace))
    }

    async fn create_namespace(&self, namespace: &str) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("create_namespace {namespace}"));
        state.namespaces.insert(namespace.to_string());
        Ok(())
    }

    async fn apply_manifest(&self, manifest: &Manifest) -> AdapterResult<()> {
        let kind = manifest
            .kind()
            .ok_or_else(|| AdapterError::new("kubectl apply", "manifest has no kind"))?
            .to_lowercase();
        let name = manifest
            .name()
            .ok_or_else(|| AdapterError::new("kubectl apply", "manifest has no name"))?
            .to_string();
        let namespace = manifest.namespace().unwrap_or("default").to_string();

        let mut state = self.state.lock();
        state.mutate(format!("apply_manifest {kind}/{name}"));
        state.objects.insert((namespace, kind, name));
        Ok(())
    }

    async fn object_exists(&self, namespace: &str, kind: &str, name: &str) -> AdapterResult<bool> {
        let mut state = self.state.lock();
        state.call(format!("object_exists {kind}/{name}"));
        Ok(state.objects.contains(&(
            namespace.to_string(),
            kind.to_lowercase(),
            name.to_string(),
        )))
    }

    async fn delete_object(&self, namespace: &str, kind: &str, name: &str) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("delete_object {kind}/{name}"));
        state.objects.remove(&(
            namespace.to_string(),
            kind.to_lowercase(),
            name.to_string(),
        ));
        Ok(())
    }

    async fn pods_ready(&self, namespace: &str, selector: &str) -> AdapterResult<PodSummary> {
        let mut state = self.state.lock();
        state.call(format!("pods_ready {namespace} {selector}"));

        if let Some(job) = selector.strip_prefix("job-name=") {
            let exists = state.objects.contains(&(
                namespace.to_string(),
                "job".to_string(),
                job.to_string(),
            ));
            let running = u32::from(exists);
            return Ok(PodSummary {
                total: running,
                ready: running,
                succeeded: 0,
                failed: 0,
            });
        }

        let converged = state
            .releases
            .iter()
            .any(|((ns, name), pending)| ns == namespace && *pending == 0 && selector.contains(name.as_str()));
        let pods = if converged { POD_COUNT } else { 0 };
        Ok(PodSummary {
            total: pods,
            ready: pods,
            succeeded: 0,
            failed: 0,
        })
    }

    async fn secret_state(&self, namespace: &str, name: &str) -> AdapterResult<SecretPresence> {
        let mut state = self.state.lock();
        state.call(format!("secret_state {namespace}/{name}"));
        Ok(state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .map_or(SecretPresence::Absent, |secret| SecretPresence::Present {
                fingerprint: secret.annotations.get(FINGERPRINT_ANNOTATION).cloned(),
            }))
    }

    async fn create_secret(&self, namespace: &str, name: &str, data: &SecretData) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("create_secret {namespace}/{name}"));
        state
            .secrets
            .insert((namespace.to_string(), name.to_string()), data.clone());
        Ok(())
    }

    async fn replace_secret(&self, namespace: &str, name: &str, data: &SecretData) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("replace_secret {namespace}/{name}"));
        state
            .secrets
            .insert((namespace.to_string(), name.to_string()), data.clone());
        Ok(())
    }
}

#[async_trait]
impl DatabaseAdapter for FakeEnvironment {
    async fn execute_statement(&self, connection: &DbConnection, sql: &str) -> AdapterResult<StatementOutput> {
        let mut state = self.state.lock();
        state.call(format!("execute_statement {}", connection.pod));
        state.statements.push(sql.to_string());
        if let Some(diagnostic) = &state.statement_failure {
            return Err(AdapterError::new("sqlcmd", diagnostic.clone()));
        }

        let statement = sql.trim().trim_end_matches(';');
        if let Some(rest) = statement.strip_prefix("UPSERT INTO ") {
            let (table, values) = rest
                .split_once(" VALUES ")
                .ok_or_else(|| AdapterError::new("sqlcmd", format!("unexpected statement: {sql}")))?;
            let value = values.trim_matches(|c| c == '(' || c == ')' || c == '\'');
            let rows = state.tables.entry(table.trim().to_string()).or_default();
            if !rows.iter().any(|row| row == value) {
                rows.push(value.to_string());
            }
            return Ok(StatementOutput::default());
        }
        if let Some(table) = statement.strip_prefix("SELECT COUNT(*) FROM ") {
            let count = state.tables.get(table.trim()).map_or(0, Vec::len);
            return Ok(StatementOutput {
                rows: vec![vec![count.to_string()]],
            });
        }
        Err(AdapterError::new(
            "sqlcmd",
            format!("unexpected statement: {sql}"),
        ))
    }
}

#[async_trait]
impl TopicAdapter for FakeEnvironment {
    async fn topic_exists(&self, _broker: &BrokerEndpoint, topic: &str) -> AdapterResult<bool> {
        let mut state = self.state.lock();
        state.call(format!("topic_exists {topic}"));
        Ok(state.topics.contains_key(topic))
    }

    async fn create_topic(&self, _broker: &BrokerEndpoint, topic: &TopicSpec) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("create_topic {}", topic.name));
        state.topics.insert(topic.name.clone(), topic.clone());
        Ok(())
    }

    async fn alter_topic_config(&self, _broker: &BrokerEndpoint, topic: &TopicSpec) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.mutate(format!("alter_topic_config {}", topic.name));
        match state.topics.get_mut(&topic.name) {
            Some(existing) => {
                existing.config.extend(topic.config.clone());
                Ok(())
            }
            None => Err(AdapterError::new(
                "rpk topic alter-config",
                format!("topic {} does not exist", topic.name),
            )),
        }
    }
}
