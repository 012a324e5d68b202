//! Sequential pipeline execution.

use super::outcome::{RunOutcome, StageRecord, StageResult};
use super::spec::StageSpec;
use super::validate::validate;
use crate::adapters::Adapters;
use crate::cancellation::CancellationToken;
use crate::context::{RunContext, RunIdentity};
use crate::errors::PreconditionError;
use crate::events::{
    EventSink, NoOpEventSink, RUN_CANCELLED, RUN_COMPLETED, RUN_HALTED, RUN_STARTED, STAGE_SKIPPED,
};
use crate::stages::{driver_for, StageController};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const DISABLED: &str = "disabled by operator";

/// Runs stages one after another, threading resolved config forward.
///
/// Halts at the first failed stage. Succeeded stages are never torn down
/// automatically.
pub struct Orchestrator {
    adapters: Adapters,
    events: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

impl Orchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        adapters: Adapters,
        events: Arc<dyn EventSink>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            adapters,
            events,
            cancel,
        }
    }

    /// Creates an orchestrator with no event sink and its own token.
    #[must_use]
    pub fn with_adapters(adapters: Adapters) -> Self {
        Self::new(
            adapters,
            Arc::new(NoOpEventSink),
            Arc::new(CancellationToken::new()),
        )
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Validates then runs `specs` in order.
    ///
    /// # Errors
    ///
    /// `PreconditionError` if validation fails. No adapter is called in that
    /// case. Stage failures are reported in the outcome, not as errors.
    pub async fn run(&self, specs: &[StageSpec]) -> Result<RunOutcome, PreconditionError> {
        validate(specs)?;

        let mut ctx = RunContext::new(RunIdentity::new());
        let run_id = ctx.identity().run_id.to_string();
        let planned: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        let controller = StageController::new(&self.adapters, self.events.clone(), self.cancel.clone());

        info!(run_id = %run_id, stages = ?planned, "Run started");
        self.events
            .emit(RUN_STARTED, Some(json!({ "run_id": run_id, "stages": planned })))
            .await;

        for spec in specs {
            if let Some(reason) = self.cancel.reason() {
                warn!(run_id = %run_id, stage = %spec.name, reason = %reason, "Run cancelled");
                self.events
                    .emit(
                        RUN_CANCELLED,
                        Some(json!({ "run_id": run_id, "before": spec.name, "reason": reason })),
                    )
                    .await;
                return Ok(ctx.into_outcome(planned, Some(reason)));
            }

            if !spec.enabled {
                info!(stage = %spec.name, "Stage disabled, skipping");
                ctx.record(StageRecord::skipped(&spec.name, spec.kind(), spec.resource(), DISABLED));
                self.events
                    .emit(
                        STAGE_SKIPPED,
                        Some(json!({ "run_id": run_id, "stage": spec.name, "reason": DISABLED })),
                    )
                    .await;
                continue;
            }

            let driver = driver_for(spec, &self.adapters);
            let record = controller.run(spec, driver.as_ref(), &ctx.view(spec)).await;
            let failure = match &ctx.record(record).result {
                StageResult::Failed(err) => Some((err.is_cancelled(), err.to_string())),
                _ => None,
            };

            if let Some((cancelled, error)) = failure {
                let payload = json!({
                    "run_id": run_id,
                    "stage": spec.name,
                    "error": error,
                });
                if cancelled {
                    let reason = self.cancel.reason().unwrap_or(error);
                    self.events.emit(RUN_CANCELLED, Some(payload)).await;
                    return Ok(ctx.into_outcome(planned, Some(reason)));
                }
                warn!(run_id = %run_id, stage = %spec.name, error = %error, "Run halted");
                self.events.emit(RUN_HALTED, Some(payload)).await;
                return Ok(ctx.into_outcome(planned, None));
            }
        }

        info!(run_id = %run_id, "Run completed");
        self.events
            .emit(RUN_COMPLETED, Some(json!({ "run_id": run_id })))
            .await;
        Ok(ctx.into_outcome(planned, None))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("adapters", &self.adapters)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}
