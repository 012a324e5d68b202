//! Run configuration document.

use crate::adapters::{ChartRef, ChartRepository, ClusterSpec, TopicSpec};
use crate::core::{ComponentKind, ResourceId};
use crate::pipeline::{StageParams, StageSpec};
use crate::provision::resolver::{
    BROKER_ADDRESS, DATABASE_CLIENT_ADDRESS, JOB_NAME, KUBE_CONTEXT, NAMESPACE, RELEASE_NAME,
};
use crate::provision::{Endpoint, RegistryCredentials, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Poll interval and timeout for one stage, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Seconds between probes.
    pub poll_interval_secs: u64,
    /// Seconds before giving up.
    pub timeout_secs: u64,
}

impl WaitConfig {
    /// Creates a wait config.
    #[must_use]
    pub const fn new(poll_interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            poll_interval_secs,
            timeout_secs,
        }
    }

    /// Converts to a waiter policy.
    #[must_use]
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy::from_secs(self.poll_interval_secs, self.timeout_secs)
    }
}

/// A chart and the repository it comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Repository alias.
    pub repo_name: String,
    /// Repository URL.
    pub repo_url: String,
    /// Chart reference (`<repo>/<chart>`).
    pub chart: String,
    /// Pinned chart version.
    #[serde(default)]
    pub version: Option<String>,
}

impl ChartConfig {
    fn new(repo_name: &str, repo_url: &str, chart: &str, version: Option<&str>) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            repo_url: repo_url.to_string(),
            chart: chart.to_string(),
            version: version.map(str::to_string),
        }
    }

    /// Returns the repository to register.
    #[must_use]
    pub fn repository(&self) -> ChartRepository {
        ChartRepository {
            name: self.repo_name.clone(),
            url: self.repo_url.clone(),
        }
    }

    /// Returns the chart reference to install.
    #[must_use]
    pub fn chart_ref(&self) -> ChartRef {
        ChartRef::new(self.chart.clone(), self.version.clone())
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// Managed cluster settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Whether this stage runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cloud project ID.
    #[serde(default)]
    pub project: String,
    /// Compute zone.
    #[serde(default = "default_zone")]
    pub zone: String,
    /// Cluster name.
    #[serde(default = "default_cluster_name")]
    pub name: String,
    /// Kubernetes version.
    #[serde(default = "default_cluster_version")]
    pub version: String,
    /// Node count.
    #[serde(default = "default_node_count")]
    pub node_count: u32,
    /// Node machine type.
    #[serde(default = "default_machine_type")]
    pub machine_type: String,
    /// Node disk size in GB.
    #[serde(default = "default_disk_size")]
    pub disk_size_gb: u32,
    /// Node disk type.
    #[serde(default = "default_disk_type")]
    pub disk_type: String,
    /// Readiness wait.
    #[serde(default = "default_cluster_wait")]
    pub wait: WaitConfig,
}

fn default_true() -> bool {
    true
}

fn default_zone() -> String {
    "asia-northeast1-b".to_string()
}

fn default_cluster_name() -> String {
    "voltsp".to_string()
}

fn default_cluster_version() -> String {
    "1.32".to_string()
}

fn default_node_count() -> u32 {
    6
}

fn default_machine_type() -> String {
    "c2-standard-16".to_string()
}

fn default_disk_size() -> u32 {
    50
}

fn default_disk_type() -> String {
    "pd-ssd".to_string()
}

fn default_cluster_wait() -> WaitConfig {
    WaitConfig::new(30, 900)
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project: String::new(),
            zone: default_zone(),
            name: default_cluster_name(),
            version: default_cluster_version(),
            node_count: default_node_count(),
            machine_type: default_machine_type(),
            disk_size_gb: default_disk_size(),
            disk_type: default_disk_type(),
            wait: default_cluster_wait(),
        }
    }
}

impl ClusterConfig {
    /// Returns the cluster resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        ResourceId::cluster(&self.project, &self.zone, &self.name)
    }

    /// Returns the creation parameters.
    #[must_use]
    pub fn spec(&self) -> ClusterSpec {
        ClusterSpec {
            project: self.project.clone(),
            zone: self.zone.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            machine_type: self.machine_type.clone(),
            node_count: self.node_count,
            disk_type: self.disk_type.clone(),
            disk_size_gb: self.disk_size_gb,
        }
    }

    /// Values contributed on success.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::KubeContext { key: KUBE_CONTEXT },
            Endpoint::ResourceName { key: "cluster-name" },
        ]
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// Stream topic settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name.
    #[serde(default = "default_topic_name")]
    pub name: String,
    /// Partition count.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// Replication factor.
    #[serde(default = "default_one")]
    pub replicas: u32,
    /// Topic configuration overrides.
    #[serde(default = "default_topic_settings")]
    pub settings: BTreeMap<String, String>,
}

fn default_topic_name() -> String {
    "ticker-data".to_string()
}

fn default_partitions() -> u32 {
    15
}

fn default_one() -> u32 {
    1
}

fn default_topic_settings() -> BTreeMap<String, String> {
    [
        ("compression.type", "lz4"),
        ("segment.bytes", "268435456"),
        ("retention.ms", "12000000"),
        ("cleanup.policy", "delete"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: default_topic_name(),
            partitions: default_partitions(),
            replicas: default_one(),
            settings: default_topic_settings(),
        }
    }
}

impl TopicConfig {
    /// Returns the topic to create.
    #[must_use]
    pub fn spec(&self) -> TopicSpec {
        TopicSpec {
            name: self.name.clone(),
            partitions: self.partitions,
            replicas: self.replicas,
            config: self.settings.clone(),
        }
    }
}

/// Message broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Whether this stage runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Namespace.
    #[serde(default = "default_broker_namespace")]
    pub namespace: String,
    /// Release name.
    #[serde(default = "default_broker_release")]
    pub release: String,
    /// Chart.
    #[serde(default = "default_broker_chart")]
    pub chart: ChartConfig,
    /// Broker replicas.
    #[serde(default = "default_broker_replicas")]
    pub replicas: u32,
    /// Whether TLS is enabled on listeners.
    #[serde(default)]
    pub tls_enabled: bool,
    /// Kafka API port.
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Topic to bootstrap.
    #[serde(default)]
    pub topic: TopicConfig,
    /// Pod selector override.
    #[serde(default)]
    pub pod_selector: Option<String>,
    /// Readiness wait.
    #[serde(default = "default_release_wait")]
    pub wait: WaitConfig,
}

fn default_broker_namespace() -> String {
    "default".to_string()
}

fn default_broker_release() -> String {
    "redpanda-cluster".to_string()
}

fn default_broker_chart() -> ChartConfig {
    ChartConfig::new(
        "redpanda",
        "https://charts.redpanda.com/",
        "redpanda/redpanda",
        Some("25.1.1"),
    )
}

fn default_broker_replicas() -> u32 {
    3
}

fn default_broker_port() -> u16 {
    9093
}

fn default_release_wait() -> WaitConfig {
    WaitConfig::new(10, 600)
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_broker_namespace(),
            release: default_broker_release(),
            chart: default_broker_chart(),
            replicas: default_broker_replicas(),
            tls_enabled: false,
            port: default_broker_port(),
            topic: TopicConfig::default(),
            pod_selector: None,
            wait: default_release_wait(),
        }
    }
}

impl BrokerConfig {
    /// Returns the release resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        ResourceId::release(&self.namespace, &self.release)
    }

    /// Returns the label selector for broker pods.
    #[must_use]
    pub fn selector(&self) -> String {
        self.pod_selector.clone().unwrap_or_else(|| {
            format!(
                "app.kubernetes.io/instance={},app.kubernetes.io/name=redpanda",
                self.release
            )
        })
    }

    /// Returns the pod used for topic administration.
    #[must_use]
    pub fn admin_pod(&self) -> String {
        format!("{}-0", self.release)
    }

    /// Values contributed on success.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::Service {
                key: BROKER_ADDRESS,
                component: None,
                port: self.port,
            },
            Endpoint::Namespace { key: NAMESPACE },
            Endpoint::ResourceName { key: RELEASE_NAME },
        ]
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Operational database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Whether this stage runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Namespace.
    #[serde(default = "default_database_namespace")]
    pub namespace: String,
    /// Release name.
    #[serde(default = "default_database_release")]
    pub release: String,
    /// Chart.
    #[serde(default = "default_database_chart")]
    pub chart: ChartConfig,
    /// Database product version.
    #[serde(default = "default_product_version")]
    pub product_version: String,
    /// Cluster replicas.
    #[serde(default = "default_one")]
    pub replicas: u32,
    /// K-safety factor.
    #[serde(default)]
    pub kfactor: u32,
    /// Execution sites per host.
    #[serde(default = "default_sites_per_host")]
    pub sites_per_host: u32,
    /// Image pull secret name.
    #[serde(default = "default_database_secret")]
    pub registry_secret: String,
    /// License file.
    #[serde(default = "default_license_file")]
    pub license_file: PathBuf,
    /// Schema DDL file.
    #[serde(default = "default_ddl_file")]
    pub ddl_file: PathBuf,
    /// Stored procedure JAR.
    #[serde(default = "default_database_jar")]
    pub jar_file: PathBuf,
    /// Chart key the DDL is stored under.
    #[serde(default = "default_ddl_key")]
    pub ddl_key: String,
    /// Chart key the JAR is stored under.
    #[serde(default = "default_jar_key")]
    pub jar_key: String,
    /// Client port.
    #[serde(default = "default_client_port")]
    pub port: u16,
    /// Table used by the connectivity check.
    #[serde(default = "default_health_table")]
    pub health_table: String,
    /// Row value written by the connectivity check.
    #[serde(default = "default_health_value")]
    pub health_value: String,
    /// Pod selector override.
    #[serde(default)]
    pub pod_selector: Option<String>,
    /// Readiness wait.
    #[serde(default = "default_database_wait")]
    pub wait: WaitConfig,
}

fn default_database_namespace() -> String {
    "voltdb".to_string()
}

fn default_database_release() -> String {
    "volt-vwap".to_string()
}

fn default_database_chart() -> ChartConfig {
    ChartConfig::new(
        "voltdb",
        "https://voltdb.github.io/helm-charts",
        "voltdb/voltdb",
        None,
    )
}

fn default_product_version() -> String {
    "13.3.6".to_string()
}

fn default_sites_per_host() -> u32 {
    8
}

fn default_database_secret() -> String {
    "dockerio-registry".to_string()
}

fn default_license_file() -> PathBuf {
    PathBuf::from("license/license.xml")
}

fn default_ddl_file() -> PathBuf {
    PathBuf::from("ddl/vwap_ddl.sql")
}

fn default_database_jar() -> PathBuf {
    PathBuf::from("jars/vwap_demo.jar")
}

fn default_ddl_key() -> String {
    "vwap_ddl_sql".to_string()
}

fn default_jar_key() -> String {
    "vwap_demo_jar".to_string()
}

fn default_client_port() -> u16 {
    21212
}

fn default_health_table() -> String {
    "DUMMY".to_string()
}

fn default_health_value() -> String {
    "X".to_string()
}

fn default_database_wait() -> WaitConfig {
    WaitConfig::new(10, 900)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_database_namespace(),
            release: default_database_release(),
            chart: default_database_chart(),
            product_version: default_product_version(),
            replicas: default_one(),
            kfactor: 0,
            sites_per_host: default_sites_per_host(),
            registry_secret: default_database_secret(),
            license_file: default_license_file(),
            ddl_file: default_ddl_file(),
            jar_file: default_database_jar(),
            ddl_key: default_ddl_key(),
            jar_key: default_jar_key(),
            port: default_client_port(),
            health_table: default_health_table(),
            health_value: default_health_value(),
            pod_selector: None,
            wait: default_database_wait(),
        }
    }
}

impl DatabaseConfig {
    /// Returns the release resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        ResourceId::release(&self.namespace, &self.release)
    }

    /// Returns the name of the database statefulset.
    #[must_use]
    pub fn statefulset(&self) -> String {
        format!("{}-voltdb-cluster", self.release)
    }

    /// Returns the label selector for database pods.
    #[must_use]
    pub fn selector(&self) -> String {
        self.pod_selector
            .clone()
            .unwrap_or_else(|| format!("voltdb-cluster-name={}", self.statefulset()))
    }

    /// Values contributed on success.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::Service {
                key: DATABASE_CLIENT_ADDRESS,
                component: Some("voltdb-cluster-client"),
                port: self.port,
            },
            Endpoint::Namespace { key: NAMESPACE },
            Endpoint::ResourceName { key: RELEASE_NAME },
        ]
    }
}

// ---------------------------------------------------------------------------
// Stream processor
// ---------------------------------------------------------------------------

/// CPU and memory for one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU limit and request.
    pub cpu: String,
    /// Memory limit and request.
    pub memory: String,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu: "2".to_string(),
            memory: "2G".to_string(),
        }
    }
}

/// Stream processor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProcessorConfig {
    /// Whether this stage runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Namespace.
    #[serde(default = "default_database_namespace")]
    pub namespace: String,
    /// Release name.
    #[serde(default = "default_pipeline_release")]
    pub release: String,
    /// Chart.
    #[serde(default = "default_pipeline_chart")]
    pub chart: ChartConfig,
    /// Image pull secret name.
    #[serde(default = "default_pipeline_secret")]
    pub registry_secret: String,
    /// License file.
    #[serde(default = "default_license_file")]
    pub license_file: PathBuf,
    /// Pipeline application JAR.
    #[serde(default = "default_pipeline_jar")]
    pub jar_file: PathBuf,
    /// Pipeline entry class.
    #[serde(default = "default_pipeline_class")]
    pub class_name: String,
    /// Database procedure the sink calls.
    #[serde(default = "default_sink_procedure")]
    pub procedure: String,
    /// Source topic.
    #[serde(default = "default_topic_name")]
    pub topic: String,
    /// Kafka consumer group.
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Container resources.
    #[serde(default)]
    pub resources: ResourceLimits,
    /// Deployment replicas.
    #[serde(default = "default_one")]
    pub replicas: u32,
    /// Pod selector override.
    #[serde(default)]
    pub pod_selector: Option<String>,
    /// Readiness wait.
    #[serde(default = "default_release_wait")]
    pub wait: WaitConfig,
}

fn default_pipeline_release() -> String {
    "pipeline1".to_string()
}

fn default_pipeline_chart() -> ChartConfig {
    ChartConfig::new(
        "voltdb",
        "https://voltdb.github.io/helm-charts",
        "voltdb/volt-streams",
        None,
    )
}

fn default_pipeline_secret() -> String {
    "voltsp-docker-registry-secret".to_string()
}

fn default_pipeline_jar() -> PathBuf {
    PathBuf::from("jars/vwap-demo-1.0-SNAPSHOT-voltsp-kafka-reader-stream.jar")
}

fn default_pipeline_class() -> String {
    "com.voltactivedata.vwapdemo.voltsp.ReadFromKafkaAndSendToVoltTickers".to_string()
}

fn default_sink_procedure() -> String {
    "ReportTickSessionAnchor".to_string()
}

fn default_group_id() -> String {
    "1".to_string()
}

impl Default for StreamProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_database_namespace(),
            release: default_pipeline_release(),
            chart: default_pipeline_chart(),
            registry_secret: default_pipeline_secret(),
            license_file: default_license_file(),
            jar_file: default_pipeline_jar(),
            class_name: default_pipeline_class(),
            procedure: default_sink_procedure(),
            topic: default_topic_name(),
            group_id: default_group_id(),
            resources: ResourceLimits::default(),
            replicas: default_one(),
            pod_selector: None,
            wait: default_release_wait(),
        }
    }
}

impl StreamProcessorConfig {
    /// Returns the release resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        ResourceId::release(&self.namespace, &self.release)
    }

    /// Returns the label selector for pipeline pods.
    #[must_use]
    pub fn selector(&self) -> String {
        self.pod_selector
            .clone()
            .unwrap_or_else(|| format!("app.kubernetes.io/instance={}", self.release))
    }

    /// Values contributed on success.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::Namespace { key: NAMESPACE },
            Endpoint::ResourceName { key: RELEASE_NAME },
        ]
    }
}

// ---------------------------------------------------------------------------
// Load generator
// ---------------------------------------------------------------------------

/// Load generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadGeneratorConfig {
    /// Whether this stage runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Namespace.
    #[serde(default = "default_loadgen_namespace")]
    pub namespace: String,
    /// Job manifest file.
    #[serde(default = "default_job_file")]
    pub job_file: PathBuf,
    /// Job name, matching the manifest.
    #[serde(default = "default_job_name")]
    pub job_name: String,
    /// ConfigMap holding the load parameters.
    #[serde(default = "default_config_map")]
    pub config_map: String,
    /// Total operations to send.
    #[serde(default = "default_total_operations")]
    pub total_operations: u64,
    /// Distinct tickers.
    #[serde(default = "default_unique_tickers")]
    pub unique_tickers: u32,
    /// Concurrent clients.
    #[serde(default = "default_one")]
    pub clients: u32,
    /// Transactions per second.
    #[serde(default = "default_tps")]
    pub tps: u32,
    /// Records to skip.
    #[serde(default)]
    pub skip: u64,
    /// Readiness wait.
    #[serde(default = "default_loadgen_wait")]
    pub wait: WaitConfig,
}

fn default_loadgen_namespace() -> String {
    "voltsp".to_string()
}

fn default_job_file() -> PathBuf {
    PathBuf::from("yaml/vwap-loadgen-job.yaml")
}

fn default_job_name() -> String {
    "vwap-loadgen".to_string()
}

fn default_config_map() -> String {
    "vwap-loadgen-config".to_string()
}

fn default_total_operations() -> u64 {
    2_000_000_000
}

fn default_unique_tickers() -> u32 {
    200
}

fn default_tps() -> u32 {
    2
}

fn default_loadgen_wait() -> WaitConfig {
    WaitConfig::new(10, 300)
}

impl Default for LoadGeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_loadgen_namespace(),
            job_file: default_job_file(),
            job_name: default_job_name(),
            config_map: default_config_map(),
            total_operations: default_total_operations(),
            unique_tickers: default_unique_tickers(),
            clients: default_one(),
            tps: default_tps(),
            skip: 0,
            wait: default_loadgen_wait(),
        }
    }
}

impl LoadGeneratorConfig {
    /// Object kind `job_file` must hold.
    pub const JOB_KIND: &'static str = "Job";

    /// Returns the job resource.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        ResourceId::job(&self.namespace, &self.job_name)
    }

    /// Builds the ConfigMap data from resolved addresses.
    #[must_use]
    pub fn config_data(&self, broker_address: &str, database_address: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("VOLTDB_SVC_ADDR".to_string(), database_address.to_string()),
            ("KAFKA_BROKER_ADDR".to_string(), broker_address.to_string()),
            ("TOTAL_OPERATIONS".to_string(), self.total_operations.to_string()),
            ("UNIQUE_TICKERS".to_string(), self.unique_tickers.to_string()),
            ("NUM_CLIENTS".to_string(), self.clients.to_string()),
            ("TPS".to_string(), self.tps.to_string()),
            ("SKIP_SOMETHING".to_string(), self.skip.to_string()),
        ])
    }

    /// Values contributed on success.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::Namespace { key: NAMESPACE },
            Endpoint::ResourceName { key: JOB_NAME },
        ]
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// The whole deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Display name of the deployment.
    #[serde(default = "default_run_name")]
    pub name: String,
    /// Registry credentials for private images.
    #[serde(default)]
    pub registry: Option<RegistryCredentials>,
    /// Cluster stage.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Broker stage.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Database stage.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Stream processor stage.
    #[serde(default)]
    pub stream_processor: StreamProcessorConfig,
    /// Load generator stage.
    #[serde(default)]
    pub load_generator: LoadGeneratorConfig,
}

fn default_run_name() -> String {
    "vwap-demo".to_string()
}

impl RunConfig {
    /// Creates a config with defaults for `project`.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            name: default_run_name(),
            registry: None,
            cluster: ClusterConfig {
                project: project.into(),
                ..ClusterConfig::default()
            },
            broker: BrokerConfig::default(),
            database: DatabaseConfig::default(),
            stream_processor: StreamProcessorConfig::default(),
            load_generator: LoadGeneratorConfig::default(),
        }
    }

    /// Sets the registry credentials.
    #[must_use]
    pub fn with_registry(mut self, registry: RegistryCredentials) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Resolves relative file paths against `base`.
    pub fn rebase_paths(&mut self, base: &Path) {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        rebase(&mut self.database.license_file);
        rebase(&mut self.database.ddl_file);
        rebase(&mut self.database.jar_file);
        rebase(&mut self.stream_processor.license_file);
        rebase(&mut self.stream_processor.jar_file);
        rebase(&mut self.load_generator.job_file);
    }

    /// Builds the ordered stage sequence.
    #[must_use]
    pub fn stage_specs(&self) -> Vec<StageSpec> {
        let broker = ComponentKind::Broker.stage_name();
        let database = ComponentKind::Database.stage_name();

        vec![
            StageSpec::new(StageParams::Cluster(self.cluster.clone()))
                .with_enabled(self.cluster.enabled),
            StageSpec::new(StageParams::Broker(self.broker.clone()))
                .with_enabled(self.broker.enabled),
            StageSpec::new(StageParams::Database(self.database.clone()))
                .with_enabled(self.database.enabled)
                .with_registry(self.registry.clone()),
            StageSpec::new(StageParams::StreamProcessor(self.stream_processor.clone()))
                .with_enabled(self.stream_processor.enabled)
                .with_registry(self.registry.clone())
                .depends_on(&[broker, database]),
            StageSpec::new(StageParams::LoadGenerator(self.load_generator.clone()))
                .with_enabled(self.load_generator.enabled)
                .depends_on(&[broker, database]),
        ]
        .into_iter()
        .enumerate()
        .map(|(ordinal, spec)| spec.with_ordinal(ordinal))
        .collect()
    }
}
