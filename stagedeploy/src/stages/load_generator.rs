use super::{provisioning, StageDriver, TeardownAction};
use crate::adapters::{Adapters, KubeAdapter, Manifest};
use crate::config::LoadGeneratorConfig;
use crate::context::StageView;
use crate::core::{ComponentKind, ResourceId};
use crate::errors::{AdapterError, DeployResult};
use crate::provision::resolver::{BROKER_ADDRESS, DATABASE_CLIENT_ADDRESS};
use crate::provision::{JobProbe, ResourceProbe};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const JOB: &str = "job";
const CONFIG_MAP: &str = "configmap";

/// Load generator job and the ConfigMap it reads its parameters from.
pub struct LoadGeneratorDriver {
    config: LoadGeneratorConfig,
    resource: ResourceId,
    kube: Arc<dyn KubeAdapter>,
    probe: JobProbe,
}

impl LoadGeneratorDriver {
    /// Creates the driver.
    #[must_use]
    pub fn new(config: LoadGeneratorConfig, adapters: &Adapters) -> Self {
        Self {
            resource: config.resource(),
            config,
            kube: adapters.kube.clone(),
            probe: JobProbe::new(adapters.kube.clone()),
        }
    }

    /// Reads the job manifest and pins its name and namespace to the
    /// configured ones, so the probe watches the object that was applied.
    ///
    /// # Errors
    ///
    /// The file cannot be read, is not a single YAML mapping, or is not a Job.
    pub async fn job_manifest(&self) -> Result<Manifest, AdapterError> {
        let path = &self.config.job_file;
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AdapterError::new("read job manifest", format!("{}: {e}", path.display())))?;
        let manifest = Manifest::from_yaml_str(&source)?;
        if manifest.kind() != Some(LoadGeneratorConfig::JOB_KIND) {
            return Err(AdapterError::new(
                "read job manifest",
                format!(
                    "{}: expected kind {}, found {}",
                    path.display(),
                    LoadGeneratorConfig::JOB_KIND,
                    manifest.kind().unwrap_or("none")
                ),
            ));
        }
        Ok(manifest
            .with_name(&self.config.job_name)
            .with_namespace(&self.config.namespace))
    }
}

#[async_trait]
impl StageDriver for LoadGeneratorDriver {
    fn probe(&self) -> &dyn ResourceProbe {
        &self.probe
    }

    async fn provision(&self, view: &StageView<'_>) -> DeployResult<()> {
        let broker = view.endpoint(ComponentKind::Broker.stage_name(), BROKER_ADDRESS)?;
        let database = view.endpoint(ComponentKind::Database.stage_name(), DATABASE_CLIENT_ADDRESS)?;

        let c = &self.config;
        let fail = provisioning(&self.resource);
        let config_map = Manifest::config_map(
            &c.namespace,
            &c.config_map,
            &c.config_data(broker, database),
        );
        let job = self.job_manifest().await.map_err(&fail)?;

        info!(config_map = %c.config_map, tps = c.tps, clients = c.clients, "Applying load generator");
        self.kube.apply_manifest(&config_map).await.map_err(&fail)?;
        self.kube.apply_manifest(&job).await.map_err(&fail)
    }

    async fn teardown(&self) -> DeployResult<TeardownAction> {
        let c = &self.config;
        let fail = provisioning(&self.resource);
        let mut action = TeardownAction::Absent;
        for (kind, name) in [(JOB, &c.job_name), (CONFIG_MAP, &c.config_map)] {
            if self
                .kube
                .object_exists(&c.namespace, kind, name)
                .await
                .map_err(&fail)?
            {
                self.kube
                    .delete_object(&c.namespace, kind, name)
                    .await
                    .map_err(&fail)?;
                action = TeardownAction::Removed;
            }
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockKubeAdapter;
    use crate::context::{RunContext, ResolvedConfig, RunIdentity};
    use crate::pipeline::{StageParams, StageRecord, StageResult, StageSpec};
    use mockall::predicate::eq;
    use std::io::Write;

    const JOB_YAML: &str = "apiVersion: batch/v1\nkind: Job\nmetadata:\n  name: vwap-loadgen\n  namespace: placeholder\nspec:\n  template:\n    spec:\n      restartPolicy: Never\n";

    fn config_with_job(dir: &tempfile::TempDir) -> LoadGeneratorConfig {
        let path = dir.path().join("job.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(JOB_YAML.as_bytes()).unwrap();
        LoadGeneratorConfig {
            job_file: path,
            ..LoadGeneratorConfig::default()
        }
    }

    fn context_with_addresses() -> RunContext {
        let mut ctx = RunContext::new(RunIdentity::new());
        for (stage, key, value) in [
            ("broker", BROKER_ADDRESS, "b:9093"),
            ("database", DATABASE_CLIENT_ADDRESS, "d:21212"),
        ] {
            let mut config = ResolvedConfig::new();
            config.insert(stage, key, value).unwrap();
            let mut record = StageRecord::skipped(stage, ComponentKind::Broker, ResourceId::release("ns", stage), "");
            record.result = StageResult::Succeeded(config);
            ctx.record(record);
        }
        ctx
    }

    fn driver_with(kube: MockKubeAdapter, config: LoadGeneratorConfig) -> LoadGeneratorDriver {
        let adapters = Adapters {
            kube: Arc::new(kube),
            ..Adapters::uniform(Arc::new(crate::testing::FakeEnvironment::new()))
        };
        LoadGeneratorDriver::new(config, &adapters)
    }

    #[tokio::test]
    async fn test_job_manifest_namespace_is_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver_with(MockKubeAdapter::new(), config_with_job(&dir));

        let manifest = driver.job_manifest().await.unwrap();
        assert_eq!(manifest.kind(), Some("Job"));
        assert_eq!(manifest.namespace(), Some("voltsp"));
    }

    #[tokio::test]
    async fn test_job_manifest_takes_configured_job_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoadGeneratorConfig {
            job_name: "vwap-loadgen-run2".to_string(),
            ..config_with_job(&dir)
        };
        let driver = driver_with(MockKubeAdapter::new(), config);

        let manifest = driver.job_manifest().await.unwrap();
        assert_eq!(manifest.name(), Some("vwap-loadgen-run2"));
        assert_eq!(driver.resource.name, "vwap-loadgen-run2");
    }

    #[tokio::test]
    async fn test_job_manifest_rejects_other_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_job(&dir);
        std::fs::write(&config.job_file, "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: x\n").unwrap();
        let driver = driver_with(MockKubeAdapter::new(), config);

        let err = driver.job_manifest().await.unwrap_err();
        assert!(err.diagnostic.contains("expected kind Job, found Deployment"));
    }

    #[tokio::test]
    async fn test_provision_applies_config_map_then_job() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_job(&dir);
        let mut kube = MockKubeAdapter::new();
        let mut seq = mockall::Sequence::new();
        kube.expect_apply_manifest()
            .withf(|m| {
                m.kind() == Some("ConfigMap")
                    && m.0["data"]["KAFKA_BROKER_ADDR"] == "b:9093"
                    && m.0["data"]["VOLTDB_SVC_ADDR"] == "d:21212"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        kube.expect_apply_manifest()
            .withf(|m| m.kind() == Some("Job"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let driver = driver_with(kube, config.clone());
        let spec = StageSpec::new(StageParams::LoadGenerator(config)).depends_on(&["broker", "database"]);
        let ctx = context_with_addresses();

        driver.provision(&ctx.view(&spec)).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_job_file_is_provisioning_error() {
        let config = LoadGeneratorConfig {
            job_file: "/nonexistent/job.yaml".into(),
            ..LoadGeneratorConfig::default()
        };
        let mut kube = MockKubeAdapter::new();
        kube.expect_apply_manifest().never();

        let driver = driver_with(kube, config.clone());
        let spec = StageSpec::new(StageParams::LoadGenerator(config)).depends_on(&["broker", "database"]);
        let ctx = context_with_addresses();

        let err = driver.provision(&ctx.view(&spec)).await.unwrap_err();
        assert_eq!(err.kind(), "provisioning");
    }

    #[tokio::test]
    async fn test_teardown_deletes_existing_objects() {
        let mut kube = MockKubeAdapter::new();
        kube.expect_object_exists()
            .with(eq("voltsp"), eq("job"), eq("vwap-loadgen"))
            .returning(|_, _, _| Ok(true));
        kube.expect_object_exists()
            .with(eq("voltsp"), eq("configmap"), eq("vwap-loadgen-config"))
            .returning(|_, _, _| Ok(false));
        kube.expect_delete_object()
            .with(eq("voltsp"), eq("job"), eq("vwap-loadgen"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let driver = driver_with(kube, LoadGeneratorConfig::default());
        assert_eq!(driver.teardown().await.unwrap(), TeardownAction::Removed);
    }
}
