use super::{provisioning, StageDriver, TeardownAction};
use crate::adapters::{Adapters, ClusterAdapter};
use crate::config::ClusterConfig;
use crate::context::StageView;
use crate::core::ResourceId;
use crate::errors::{DeployError, DeployResult};
use crate::provision::{ClusterProbe, ResourceProbe};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Managed cluster. Post-condition: kubectl credentials are fetched.
pub struct ClusterDriver {
    config: ClusterConfig,
    resource: ResourceId,
    adapter: Arc<dyn ClusterAdapter>,
    probe: ClusterProbe,
}

impl ClusterDriver {
    /// Creates the driver.
    #[must_use]
    pub fn new(config: ClusterConfig, adapters: &Adapters) -> Self {
        Self {
            resource: config.resource(),
            config,
            adapter: adapters.cluster.clone(),
            probe: ClusterProbe::new(adapters.cluster.clone()),
        }
    }
}

#[async_trait]
impl StageDriver for ClusterDriver {
    fn probe(&self) -> &dyn ResourceProbe {
        &self.probe
    }

    async fn provision(&self, _view: &StageView<'_>) -> DeployResult<()> {
        info!(
            machine_type = %self.config.machine_type,
            nodes = self.config.node_count,
            "Creating cluster"
        );
        self.adapter
            .create_cluster(&self.config.spec())
            .await
            .map_err(provisioning(&self.resource))
    }

    async fn post_check(&self, _view: &StageView<'_>) -> DeployResult<()> {
        let c = &self.config;
        self.adapter
            .fetch_credentials(&c.project, &c.zone, &c.name)
            .await
            .map_err(|e| DeployError::connectivity(&self.resource, e.to_string()))
    }

    async fn teardown(&self) -> DeployResult<TeardownAction> {
        let c = &self.config;
        let exists = self
            .adapter
            .cluster_exists(&c.project, &c.zone, &c.name)
            .await
            .map_err(provisioning(&self.resource))?;
        if !exists {
            return Ok(TeardownAction::Absent);
        }
        self.adapter
            .delete_cluster(&c.project, &c.zone, &c.name)
            .await
            .map_err(provisioning(&self.resource))?;
        Ok(TeardownAction::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockClusterAdapter;
    use crate::context::{RunContext, RunIdentity};
    use crate::pipeline::{StageParams, StageSpec};
    use crate::testing::FakeEnvironment;
    use mockall::predicate::{always, eq};

    fn adapters_with(cluster: MockClusterAdapter) -> Adapters {
        Adapters {
            cluster: Arc::new(cluster),
            ..Adapters::uniform(Arc::new(FakeEnvironment::new()))
        }
    }

    fn config() -> ClusterConfig {
        ClusterConfig {
            project: "demo-project".to_string(),
            ..ClusterConfig::default()
        }
    }

    #[tokio::test]
    async fn test_provision_creates_with_configured_spec() {
        let mut mock = MockClusterAdapter::new();
        mock.expect_create_cluster()
            .withf(|spec| spec.name == "voltsp" && spec.node_count == 6 && spec.disk_type == "pd-ssd")
            .times(1)
            .returning(|_| Ok(()));

        let driver = ClusterDriver::new(config(), &adapters_with(mock));
        let spec = StageSpec::new(StageParams::Cluster(config()));
        let ctx = RunContext::new(RunIdentity::new());

        driver.provision(&ctx.view(&spec)).await.unwrap();
    }

    #[tokio::test]
    async fn test_credentials_failure_is_connectivity() {
        let mut mock = MockClusterAdapter::new();
        mock.expect_fetch_credentials()
            .with(eq("demo-project"), eq("asia-northeast1-b"), eq("voltsp"))
            .returning(|_, _, _| Err(crate::errors::AdapterError::new("get-credentials", "403")));

        let driver = ClusterDriver::new(config(), &adapters_with(mock));
        let spec = StageSpec::new(StageParams::Cluster(config()));
        let ctx = RunContext::new(RunIdentity::new());

        let err = driver.post_check(&ctx.view(&spec)).await.unwrap_err();
        assert_eq!(err.kind(), "connectivity");
    }

    #[tokio::test]
    async fn test_teardown_skips_absent_cluster() {
        let mut mock = MockClusterAdapter::new();
        mock.expect_cluster_exists()
            .with(always(), always(), eq("voltsp"))
            .returning(|_, _, _| Ok(false));
        mock.expect_delete_cluster().never();

        let driver = ClusterDriver::new(config(), &adapters_with(mock));
        assert_eq!(driver.teardown().await.unwrap(), TeardownAction::Absent);
    }
}
