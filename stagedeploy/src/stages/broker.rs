use super::{provisioning, StageDriver, TeardownAction};
use crate::adapters::{Adapters, BrokerEndpoint, ReleaseAdapter, ReleaseValues, TopicAdapter};
use crate::config::BrokerConfig;
use crate::context::StageView;
use crate::core::{ResourceId, ResourceKind};
use crate::errors::DeployResult;
use crate::provision::{ReleaseProbe, ResourceProbe};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Message broker release. Post-condition: the stream topic exists.
pub struct BrokerDriver {
    config: BrokerConfig,
    resource: ResourceId,
    releases: Arc<dyn ReleaseAdapter>,
    topics: Arc<dyn TopicAdapter>,
    probe: ReleaseProbe,
}

impl BrokerDriver {
    /// Creates the driver.
    #[must_use]
    pub fn new(config: BrokerConfig, adapters: &Adapters) -> Self {
        let probe = ReleaseProbe::new(
            adapters.releases.clone(),
            adapters.kube.clone(),
            config.selector(),
            config.replicas,
        );
        Self {
            resource: config.resource(),
            config,
            releases: adapters.releases.clone(),
            topics: adapters.topics.clone(),
            probe,
        }
    }

    /// Chart values for the release.
    #[must_use]
    pub fn values(&self) -> ReleaseValues {
        ReleaseValues::new()
            .set("statefulset.replicas", self.config.replicas)
            .set("tls.enabled", self.config.tls_enabled)
    }

    /// Admin endpoint used for topic management. Addresses the first broker
    /// pod directly rather than the load-balanced service.
    #[must_use]
    pub fn admin_endpoint(&self) -> BrokerEndpoint {
        let c = &self.config;
        let pod = c.admin_pod();
        BrokerEndpoint {
            address: format!(
                "{pod}.{}.{}.svc.cluster.local:{}",
                c.release, c.namespace, c.port
            ),
            namespace: c.namespace.clone(),
            pod,
        }
    }
}

#[async_trait]
impl StageDriver for BrokerDriver {
    fn probe(&self) -> &dyn ResourceProbe {
        &self.probe
    }

    async fn provision(&self, _view: &StageView<'_>) -> DeployResult<()> {
        let c = &self.config;
        let fail = provisioning(&self.resource);
        self.releases
            .add_repository(&c.chart.repository())
            .await
            .map_err(&fail)?;
        info!(chart = %c.chart.chart, replicas = c.replicas, "Installing broker");
        self.releases
            .install_or_upgrade(&c.namespace, &c.release, &c.chart.chart_ref(), &self.values())
            .await
            .map_err(&fail)
    }

    async fn post_check(&self, _view: &StageView<'_>) -> DeployResult<()> {
        let topic = self.config.topic.spec();
        let resource = ResourceId::namespaced(ResourceKind::Topic, &self.config.namespace, &topic.name);
        let fail = provisioning(&resource);
        let broker = self.admin_endpoint();

        if self
            .topics
            .topic_exists(&broker, &topic.name)
            .await
            .map_err(&fail)?
        {
            return Ok(());
        }

        info!(topic = %topic.name, partitions = topic.partitions, "Creating topic");
        self.topics.create_topic(&broker, &topic).await.map_err(&fail)?;
        if !topic.config.is_empty() {
            self.topics
                .alter_topic_config(&broker, &topic)
                .await
                .map_err(&fail)?;
        }
        Ok(())
    }

    async fn teardown(&self) -> DeployResult<TeardownAction> {
        uninstall_release(self.releases.as_ref(), &self.resource).await
    }
}

pub(super) async fn uninstall_release(
    releases: &dyn ReleaseAdapter,
    resource: &ResourceId,
) -> DeployResult<TeardownAction> {
    let fail = provisioning(resource);
    let namespace = resource.namespace().unwrap_or_default();
    if !releases
        .release_exists(namespace, &resource.name)
        .await
        .map_err(&fail)?
    {
        return Ok(TeardownAction::Absent);
    }
    releases
        .uninstall(namespace, &resource.name)
        .await
        .map_err(&fail)?;
    Ok(TeardownAction::Removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTopicAdapter;
    use crate::context::{RunContext, RunIdentity};
    use crate::pipeline::{StageParams, StageSpec};
    use crate::testing::FakeEnvironment;
    use mockall::predicate::{always, eq};
    use serde_json::json;

    fn driver_with(topics: MockTopicAdapter) -> BrokerDriver {
        let adapters = Adapters {
            topics: Arc::new(topics),
            ..Adapters::uniform(Arc::new(FakeEnvironment::new()))
        };
        BrokerDriver::new(BrokerConfig::default(), &adapters)
    }

    #[test]
    fn test_values_and_admin_endpoint() {
        let driver = driver_with(MockTopicAdapter::new());
        let values = driver.values();
        assert_eq!(values.get("statefulset.replicas"), Some(&json!(3)));
        assert_eq!(values.get("tls.enabled"), Some(&json!(false)));

        let admin = driver.admin_endpoint();
        assert_eq!(admin.pod, "redpanda-cluster-0");
        assert_eq!(
            admin.address,
            "redpanda-cluster-0.redpanda-cluster.default.svc.cluster.local:9093"
        );
    }

    #[tokio::test]
    async fn test_topic_created_and_configured_when_absent() {
        let mut topics = MockTopicAdapter::new();
        topics
            .expect_topic_exists()
            .with(always(), eq("ticker-data"))
            .returning(|_, _| Ok(false));
        topics
            .expect_create_topic()
            .withf(|_, t| t.partitions == 15 && t.replicas == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        topics
            .expect_alter_topic_config()
            .withf(|_, t| t.config["compression.type"] == "lz4")
            .times(1)
            .returning(|_, _| Ok(()));

        let driver = driver_with(topics);
        let spec = StageSpec::new(StageParams::Broker(BrokerConfig::default()));
        let ctx = RunContext::new(RunIdentity::new());
        driver.post_check(&ctx.view(&spec)).await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_topic_is_left_alone() {
        let mut topics = MockTopicAdapter::new();
        topics.expect_topic_exists().returning(|_, _| Ok(true));
        topics.expect_create_topic().never();
        topics.expect_alter_topic_config().never();

        let driver = driver_with(topics);
        let spec = StageSpec::new(StageParams::Broker(BrokerConfig::default()));
        let ctx = RunContext::new(RunIdentity::new());
        driver.post_check(&ctx.view(&spec)).await.unwrap();
    }

    #[tokio::test]
    async fn test_topic_failure_names_topic_resource() {
        let mut topics = MockTopicAdapter::new();
        topics.expect_topic_exists().returning(|_, _| Ok(false));
        topics.expect_create_topic().returning(|_, _| {
            Err(crate::errors::AdapterError::new("rpk topic create", "INVALID_REPLICATION_FACTOR"))
        });

        let driver = driver_with(topics);
        let spec = StageSpec::new(StageParams::Broker(BrokerConfig::default()));
        let ctx = RunContext::new(RunIdentity::new());
        let err = driver.post_check(&ctx.view(&spec)).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("topic/default/ticker-data"));
        assert!(message.contains("INVALID_REPLICATION_FACTOR"));
    }
}
