//! The per-stage state machine.
//!
//! `NotStarted -> Probing -> (Provisioning | Waiting) -> Ready -> Succeeded`,
//! with `Failed` reachable from every non-terminal phase. The controller is
//! the same for every component; only the [`StageDriver`] differs.

use super::StageDriver;
use crate::adapters::{Adapters, KubeAdapter};
use crate::cancellation::CancellationToken;
use crate::context::{ResolvedConfig, StageView};
use crate::core::{ResourceId, ResourceKind, ResourceScope, ResourceState, StagePhase};
use crate::errors::{DeployError, DeployResult};
use crate::events::{
    EventSink, STAGE_FAILED, STAGE_PROBED, STAGE_PROVISIONING, STAGE_STARTED, STAGE_SUCCEEDED,
    STAGE_WAITING,
};
use crate::pipeline::{StageRecord, StageResult, StageSpec};
use crate::provision::{ConfigResolver, ReadinessWaiter, SecretProvisioner};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Drives one stage to a terminal result.
pub struct StageController {
    kube: Arc<dyn KubeAdapter>,
    secrets: SecretProvisioner,
    waiter: ReadinessWaiter,
    events: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

#[derive(Debug, Default)]
struct Progress {
    phases: Vec<StagePhase>,
    already_ready: bool,
    provisioned: bool,
}

impl Progress {
    fn enter(&mut self, phase: StagePhase) {
        debug!(phase = %phase, "Stage phase");
        self.phases.push(phase);
    }
}

impl StageController {
    /// Creates a controller.
    #[must_use]
    pub fn new(
        adapters: &Adapters,
        events: Arc<dyn EventSink>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            kube: adapters.kube.clone(),
            secrets: SecretProvisioner::new(adapters.kube.clone()),
            waiter: ReadinessWaiter::new(cancel.clone()),
            events,
            cancel,
        }
    }

    /// Runs the stage and returns its record. Never panics on stage failure;
    /// every error ends up in the record.
    pub async fn run(
        &self,
        spec: &StageSpec,
        driver: &dyn StageDriver,
        view: &StageView<'_>,
    ) -> StageRecord {
        let resource = spec.resource();
        let span = info_span!("stage", stage = %spec.name, resource = %resource);
        self.run_stage(spec, driver, view, resource)
            .instrument(span)
            .await
    }

    async fn run_stage(
        &self,
        spec: &StageSpec,
        driver: &dyn StageDriver,
        view: &StageView<'_>,
        resource: ResourceId,
    ) -> StageRecord {
        let started_at = Utc::now();
        let mut progress = Progress {
            phases: vec![StagePhase::NotStarted],
            ..Progress::default()
        };
        info!("Stage started");
        self.emit(STAGE_STARTED, view, &resource, json!({})).await;

        let result = match self
            .drive(spec, driver, view, &resource, &mut progress)
            .await
        {
            Ok(config) => {
                progress.enter(StagePhase::Succeeded);
                info!(
                    already_ready = progress.already_ready,
                    provisioned = progress.provisioned,
                    "Stage succeeded"
                );
                self.emit(
                    STAGE_SUCCEEDED,
                    view,
                    &resource,
                    json!({
                        "already_ready": progress.already_ready,
                        "resolved": &config,
                    }),
                )
                .await;
                StageResult::Succeeded(config)
            }
            Err(err) => {
                let failed_in = progress.phases.last().copied();
                progress.enter(StagePhase::Failed);
                warn!(error = %err, kind = err.kind(), "Stage failed");
                self.emit(
                    STAGE_FAILED,
                    view,
                    &resource,
                    json!({
                        "error_kind": err.kind(),
                        "error": err.to_string(),
                        "phase": failed_in.map(|p| p.to_string()),
                    }),
                )
                .await;
                StageResult::Failed(err)
            }
        };

        StageRecord {
            stage: spec.name.clone(),
            kind: spec.kind(),
            resource,
            result,
            already_ready: progress.already_ready,
            provisioned: progress.provisioned,
            transitions: progress.phases,
            started_at,
            ended_at: Utc::now(),
        }
    }

    async fn drive(
        &self,
        spec: &StageSpec,
        driver: &dyn StageDriver,
        view: &StageView<'_>,
        resource: &ResourceId,
        progress: &mut Progress,
    ) -> DeployResult<ResolvedConfig> {
        let policy = spec.params.wait();

        progress.enter(StagePhase::Probing);
        let state = self
            .waiter
            .first_observation(driver.probe(), resource, policy)
            .await?;
        info!(state = %state, "Probed resource");
        self.emit(STAGE_PROBED, view, resource, json!({ "state": state.to_string() }))
            .await;

        match state {
            ResourceState::Ready => progress.already_ready = true,
            ResourceState::Failed { reason } => {
                return Err(DeployError::ReadinessFailed {
                    resource: resource.clone(),
                    reason,
                });
            }
            ResourceState::Absent => {
                if let Some(reason) = self.cancel.reason() {
                    return Err(DeployError::Cancelled { reason });
                }
                progress.enter(StagePhase::Provisioning);
                self.emit(STAGE_PROVISIONING, view, resource, json!({})).await;
                self.prepare(spec, resource).await?;
                progress.provisioned = true;
                driver.provision(view).await?;
                self.wait(driver, view, resource, spec, progress).await?;
            }
            ResourceState::Pending { .. } => {
                self.wait(driver, view, resource, spec, progress).await?;
            }
        }

        progress.enter(StagePhase::Ready);
        driver.post_check(view).await?;

        Ok(ConfigResolver::resolve(
            &spec.name,
            resource,
            &spec.params.endpoints(),
        )?)
    }

    async fn wait(
        &self,
        driver: &dyn StageDriver,
        view: &StageView<'_>,
        resource: &ResourceId,
        spec: &StageSpec,
        progress: &mut Progress,
    ) -> DeployResult<()> {
        let policy = spec.params.wait();
        progress.enter(StagePhase::Waiting);
        self.emit(
            STAGE_WAITING,
            view,
            resource,
            json!({
                "poll_interval_secs": policy.poll_interval.as_secs(),
                "timeout_secs": policy.timeout.as_secs(),
            }),
        )
        .await;

        let report = self
            .waiter
            .await_ready(driver.probe(), resource, policy)
            .await?;
        info!(polls = report.polls, waited_secs = report.waited.as_secs(), "Resource ready");
        Ok(())
    }

    /// Namespace and pull secret bootstrap on the provisioning path.
    async fn prepare(&self, spec: &StageSpec, resource: &ResourceId) -> DeployResult<()> {
        if let Some(namespace) = resource.namespace() {
            let ns = ResourceId::new(ResourceKind::Namespace, ResourceScope::Global, namespace);
            let exists = self
                .kube
                .namespace_exists(namespace)
                .await
                .map_err(|e| DeployError::provisioning(&ns, e))?;
            if !exists {
                info!(namespace = %namespace, "Creating namespace");
                self.kube
                    .create_namespace(namespace)
                    .await
                    .map_err(|e| DeployError::provisioning(&ns, e))?;
            }
        }

        if let (Some(credentials), Some((namespace, name))) =
            (&spec.registry, spec.params.pull_secret())
        {
            self.secrets
                .ensure_secret(namespace, name, credentials)
                .await?;
        }
        Ok(())
    }

    async fn emit(&self, event: &str, view: &StageView<'_>, resource: &ResourceId, extra: Value) {
        let mut data = json!({
            "run_id": view.identity().run_id.to_string(),
            "stage": view.stage(),
            "resource": resource.to_string(),
        });
        if let (Value::Object(data), Value::Object(extra)) = (&mut data, extra) {
            data.extend(extra);
        }
        self.events.emit(event, Some(data)).await;
    }
}

impl std::fmt::Debug for StageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageController")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerConfig, WaitConfig};
    use crate::context::{RunContext, RunIdentity};
    use crate::errors::AdapterError;
    use crate::events;
    use crate::pipeline::StageParams;
    use crate::provision::ResourceProbe;
    use crate::stages::TeardownAction;
    use crate::testing::{FakeEnvironment, RecordingEventSink, ScriptedProbe};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubDriver {
        probe: ScriptedProbe,
        provisions: AtomicU32,
        post_checks: AtomicU32,
        post_check_error: Option<DeployError>,
    }

    impl StubDriver {
        fn new(states: Vec<ResourceState>) -> Self {
            Self {
                probe: ScriptedProbe::new(states),
                provisions: AtomicU32::new(0),
                post_checks: AtomicU32::new(0),
                post_check_error: None,
            }
        }
    }

    #[async_trait]
    impl StageDriver for StubDriver {
        fn probe(&self) -> &dyn ResourceProbe {
            &self.probe
        }

        async fn provision(&self, _view: &StageView<'_>) -> DeployResult<()> {
            self.provisions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn post_check(&self, _view: &StageView<'_>) -> DeployResult<()> {
            self.post_checks.fetch_add(1, Ordering::SeqCst);
            self.post_check_error.clone().map_or(Ok(()), Err)
        }

        async fn teardown(&self) -> DeployResult<TeardownAction> {
            Ok(TeardownAction::Absent)
        }
    }

    fn broker_spec() -> StageSpec {
        let config = BrokerConfig {
            wait: WaitConfig::new(1, 30),
            ..BrokerConfig::default()
        };
        StageSpec::new(StageParams::Broker(config))
    }

    fn controller() -> (StageController, Arc<FakeEnvironment>, Arc<RecordingEventSink>, Arc<CancellationToken>) {
        let env = Arc::new(FakeEnvironment::new());
        let sink = Arc::new(RecordingEventSink::new());
        let cancel = Arc::new(CancellationToken::new());
        let controller = StageController::new(
            &Adapters::uniform(env.clone()),
            sink.clone(),
            cancel.clone(),
        );
        (controller, env, sink, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_resource_is_provisioned_once() {
        let (controller, env, sink, _) = controller();
        let driver = StubDriver::new(vec![
            ResourceState::Absent,
            ResourceState::pending("0/3 pods ready"),
            ResourceState::Ready,
        ]);
        let spec = broker_spec();
        let ctx = RunContext::new(RunIdentity::new());

        let record = controller.run(&spec, &driver, &ctx.view(&spec)).await;

        assert!(record.result.is_success());
        assert!(record.provisioned);
        assert!(!record.already_ready);
        assert_eq!(driver.provisions.load(Ordering::SeqCst), 1);
        assert_eq!(driver.post_checks.load(Ordering::SeqCst), 1);
        assert_eq!(
            record.transitions,
            vec![
                StagePhase::NotStarted,
                StagePhase::Probing,
                StagePhase::Provisioning,
                StagePhase::Waiting,
                StagePhase::Ready,
                StagePhase::Succeeded,
            ]
        );
        assert_eq!(env.mutations(), vec!["create_namespace default".to_string()]);
        assert_eq!(
            sink.event_types(),
            vec![
                events::STAGE_STARTED,
                events::STAGE_PROBED,
                events::STAGE_PROVISIONING,
                events::STAGE_WAITING,
                events::STAGE_SUCCEEDED,
            ]
        );
        let resolved = record.result.resolved().unwrap();
        assert_eq!(
            resolved.get("broker", "broker-address"),
            Some("redpanda-cluster.default.svc.cluster.local:9093")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_resource_skips_provisioning() {
        let (controller, env, _, _) = controller();
        let driver = StubDriver::new(vec![ResourceState::Ready]);
        let spec = broker_spec();
        let ctx = RunContext::new(RunIdentity::new());

        let record = controller.run(&spec, &driver, &ctx.view(&spec)).await;

        assert!(record.result.is_success());
        assert!(record.already_ready);
        assert!(!record.provisioned);
        assert_eq!(driver.provisions.load(Ordering::SeqCst), 0);
        assert_eq!(driver.post_checks.load(Ordering::SeqCst), 1);
        assert!(env.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_resource_waits_without_provisioning() {
        let (controller, _, _, _) = controller();
        let driver = StubDriver::new(vec![ResourceState::pending("rolling"), ResourceState::Ready]);
        let spec = broker_spec();
        let ctx = RunContext::new(RunIdentity::new());

        let record = controller.run(&spec, &driver, &ctx.view(&spec)).await;

        assert!(record.result.is_success());
        assert_eq!(driver.provisions.load(Ordering::SeqCst), 0);
        assert!(record.transitions.contains(&StagePhase::Waiting));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resource_is_not_remediated() {
        let (controller, env, _, _) = controller();
        let driver = StubDriver::new(vec![ResourceState::failed("release status: failed")]);
        let spec = broker_spec();
        let ctx = RunContext::new(RunIdentity::new());

        let record = controller.run(&spec, &driver, &ctx.view(&spec)).await;

        assert!(matches!(
            record.result,
            StageResult::Failed(DeployError::ReadinessFailed { .. })
        ));
        assert_eq!(driver.provisions.load(Ordering::SeqCst), 0);
        assert!(env.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_check_failure_fails_ready_stage() {
        let (controller, _, sink, _) = controller();
        let mut driver = StubDriver::new(vec![ResourceState::Ready]);
        driver.post_check_error = Some(DeployError::connectivity(
            &broker_spec().resource(),
            AdapterError::new("sqlcmd", "connection refused").to_string(),
        ));
        let spec = broker_spec();
        let ctx = RunContext::new(RunIdentity::new());

        let record = controller.run(&spec, &driver, &ctx.view(&spec)).await;

        assert!(matches!(
            record.result,
            StageResult::Failed(DeployError::Connectivity { .. })
        ));
        assert_eq!(record.final_phase(), StagePhase::Failed);
        let failed = sink.events_of(events::STAGE_FAILED);
        assert_eq!(failed[0]["phase"], "ready");
        assert_eq!(failed[0]["error_kind"], "connectivity");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_provisioning() {
        let (controller, env, _, cancel) = controller();
        cancel.cancel("operator interrupt");
        let driver = StubDriver::new(vec![ResourceState::Absent]);
        let spec = broker_spec();
        let ctx = RunContext::new(RunIdentity::new());

        let record = controller.run(&spec, &driver, &ctx.view(&spec)).await;

        assert!(matches!(
            record.result,
            StageResult::Failed(DeployError::Cancelled { .. })
        ));
        assert_eq!(driver.provisions.load(Ordering::SeqCst), 0);
        assert!(env.mutations().is_empty());
    }
}
