//! Stage drivers and the uniform stage controller.
//!
//! Every component is brought up by the same state machine in
//! [`controller`]. A [`StageDriver`] only supplies the parameters that differ
//! between components: how the resource is probed, the provisioning action,
//! an optional post-condition and the teardown action.

mod broker;
mod cluster;
pub mod controller;
mod database;
mod load_generator;
mod stream_processor;

use crate::adapters::Adapters;
use crate::context::StageView;
use crate::core::ResourceId;
use crate::errors::{DeployError, DeployResult};
use crate::pipeline::{StageParams, StageSpec};
use crate::provision::ResourceProbe;
use async_trait::async_trait;

pub use broker::BrokerDriver;
pub use cluster::ClusterDriver;
pub use controller::StageController;
pub use database::DatabaseDriver;
pub use load_generator::LoadGeneratorDriver;
pub use stream_processor::StreamProcessorDriver;

/// What a teardown call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownAction {
    /// The component was removed.
    Removed,
    /// Nothing to remove.
    Absent,
}

/// Component-specific parameters of the stage state machine.
#[async_trait]
pub trait StageDriver: Send + Sync {
    /// Returns the probe for the stage's resource.
    fn probe(&self) -> &dyn ResourceProbe;

    /// Provisions the resource. Called at most once per run, only when the
    /// first probe reported `Absent`.
    async fn provision(&self, view: &StageView<'_>) -> DeployResult<()>;

    /// Checks the component is usable once its resource is `Ready`.
    async fn post_check(&self, _view: &StageView<'_>) -> DeployResult<()> {
        Ok(())
    }

    /// Removes the component.
    async fn teardown(&self) -> DeployResult<TeardownAction>;
}

/// Builds the driver for `spec`.
#[must_use]
pub fn driver_for(spec: &StageSpec, adapters: &Adapters) -> Box<dyn StageDriver> {
    let pull_secret = spec
        .registry
        .as_ref()
        .and_then(|_| spec.params.pull_secret())
        .map(|(_, name)| name.to_string());

    match &spec.params {
        StageParams::Cluster(config) => Box::new(ClusterDriver::new(config.clone(), adapters)),
        StageParams::Broker(config) => Box::new(BrokerDriver::new(config.clone(), adapters)),
        StageParams::Database(config) => {
            Box::new(DatabaseDriver::new(config.clone(), adapters, pull_secret))
        }
        StageParams::StreamProcessor(config) => Box::new(StreamProcessorDriver::new(
            config.clone(),
            adapters,
            pull_secret,
        )),
        StageParams::LoadGenerator(config) => {
            Box::new(LoadGeneratorDriver::new(config.clone(), adapters))
        }
    }
}

fn provisioning(resource: &ResourceId) -> impl Fn(crate::errors::AdapterError) -> DeployError + '_ {
    move |err| DeployError::provisioning(resource, err)
}
