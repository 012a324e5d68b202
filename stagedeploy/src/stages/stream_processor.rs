use super::broker::uninstall_release;
use super::{provisioning, StageDriver, TeardownAction};
use crate::adapters::{Adapters, ReleaseAdapter, ReleaseValues};
use crate::config::StreamProcessorConfig;
use crate::context::StageView;
use crate::core::{ComponentKind, ResourceId};
use crate::errors::DeployResult;
use crate::provision::resolver::{BROKER_ADDRESS, DATABASE_CLIENT_ADDRESS};
use crate::provision::{ReleaseProbe, ResourceProbe};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const SOURCE: &str = "streaming.pipeline.configuration.source.kafka";
const SINK: &str = "streaming.pipeline.configuration.sink.voltdb-procedure";

/// Stream processor release reading the broker topic into the database.
pub struct StreamProcessorDriver {
    config: StreamProcessorConfig,
    resource: ResourceId,
    pull_secret: Option<String>,
    releases: Arc<dyn ReleaseAdapter>,
    probe: ReleaseProbe,
}

impl StreamProcessorDriver {
    /// Creates the driver.
    #[must_use]
    pub fn new(config: StreamProcessorConfig, adapters: &Adapters, pull_secret: Option<String>) -> Self {
        let probe = ReleaseProbe::new(
            adapters.releases.clone(),
            adapters.kube.clone(),
            config.selector(),
            config.replicas,
        );
        Self {
            resource: config.resource(),
            config,
            pull_secret,
            releases: adapters.releases.clone(),
            probe,
        }
    }

    /// Chart values with the resolved broker and database addresses.
    #[must_use]
    pub fn values(&self, broker_address: &str, database_address: &str) -> ReleaseValues {
        let c = &self.config;
        let mut values = ReleaseValues::new()
            .set("replicaCount", c.replicas)
            .set("resources.limits.cpu", c.resources.cpu.as_str())
            .set("resources.limits.memory", c.resources.memory.as_str())
            .set("resources.requests.cpu", c.resources.cpu.as_str())
            .set("resources.requests.memory", c.resources.memory.as_str())
            .set("streaming.pipeline.className", c.class_name.as_str())
            .set(&format!("{SINK}.servers"), database_address)
            .set(&format!("{SINK}.procedureName"), c.procedure.as_str())
            .set(&format!("{SOURCE}.topicNames"), c.topic.as_str())
            .set(&format!("{SOURCE}.bootstrapServers"), broker_address)
            .set(&format!("{SOURCE}.groupId"), c.group_id.as_str())
            .set_file("streaming.licenseXMLFile", &c.license_file)
            .set_file("streaming.voltapps", &c.jar_file);
        if let Some(secret) = &self.pull_secret {
            values = values.set("imagePullSecrets", json!([{ "name": secret }]));
        }
        values
    }
}

#[async_trait]
impl StageDriver for StreamProcessorDriver {
    fn probe(&self) -> &dyn ResourceProbe {
        &self.probe
    }

    async fn provision(&self, view: &StageView<'_>) -> DeployResult<()> {
        let broker = view.endpoint(ComponentKind::Broker.stage_name(), BROKER_ADDRESS)?;
        let database = view.endpoint(ComponentKind::Database.stage_name(), DATABASE_CLIENT_ADDRESS)?;

        let c = &self.config;
        let fail = provisioning(&self.resource);
        self.releases
            .add_repository(&c.chart.repository())
            .await
            .map_err(&fail)?;
        info!(broker = %broker, database = %database, class = %c.class_name, "Installing stream processor");
        self.releases
            .install_or_upgrade(
                &c.namespace,
                &c.release,
                &c.chart.chart_ref(),
                &self.values(broker, database),
            )
            .await
            .map_err(&fail)
    }

    async fn teardown(&self) -> DeployResult<TeardownAction> {
        uninstall_release(self.releases.as_ref(), &self.resource).await
    }
}
