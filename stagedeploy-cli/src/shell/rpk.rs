//! Topic administration with `rpk`, run inside a broker pod.

use super::{args, Shell};
use async_trait::async_trait;
use stagedeploy::adapters::{AdapterResult, BrokerEndpoint, TopicAdapter, TopicSpec};

const KUBECTL: &str = "kubectl";
const CONTAINER: &str = "redpanda";

/// Topic administration via `kubectl exec ... rpk`.
#[derive(Debug, Clone, Copy)]
pub struct Rpk {
    shell: Shell,
}

impl Rpk {
    /// Creates the adapter.
    #[must_use]
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }

    async fn rpk(&self, broker: &BrokerEndpoint, rpk_args: Vec<String>) -> AdapterResult<String> {
        let mut args = args!["exec", broker.pod, "-n", broker.namespace, "-c", CONTAINER, "--", "rpk"];
        args.extend(rpk_args);
        self.shell.run(KUBECTL, &args, None).await
    }
}

/// Returns true if `rpk topic list` output names `topic`.
fn lists_topic(listing: &str, topic: &str) -> bool {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name == topic)
}

fn alter_args(topic: &TopicSpec) -> Vec<String> {
    let mut args = args!["topic", "alter-config", topic.name];
    for (key, value) in &topic.config {
        args.extend(args!["--set", format!("{key}={value}")]);
    }
    args
}

#[async_trait]
impl TopicAdapter for Rpk {
    async fn topic_exists(&self, broker: &BrokerEndpoint, topic: &str) -> AdapterResult<bool> {
        let listing = self.rpk(broker, args!["topic", "list"]).await?;
        Ok(lists_topic(&listing, topic))
    }

    async fn create_topic(&self, broker: &BrokerEndpoint, topic: &TopicSpec) -> AdapterResult<()> {
        self.rpk(
            broker,
            args![
                "topic",
                "create",
                topic.name,
                "--partitions",
                topic.partitions,
                "--replicas",
                topic.replicas,
            ],
        )
        .await?;
        Ok(())
    }

    async fn alter_topic_config(&self, broker: &BrokerEndpoint, topic: &TopicSpec) -> AdapterResult<()> {
        if topic.config.is_empty() {
            return Ok(());
        }
        self.rpk(broker, alter_args(topic)).await?;
        Ok(())
    }
}
