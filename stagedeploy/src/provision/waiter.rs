//! Readiness waiter.
//!
//! Polls a [`ResourceProbe`] on a fixed interval until the resource reaches a
//! terminal state or the deadline passes. Probe errors are treated like a
//! `Pending` observation and retried until the same deadline.

use super::probe::ResourceProbe;
use crate::cancellation::CancellationToken;
use crate::core::{ResourceId, ResourceState};
use crate::errors::{ContractErrorInfo, DeployError, DeployResult, PreconditionError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Poll interval and deadline for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Time between probes.
    pub poll_interval: Duration,
    /// Total time allowed.
    pub timeout: Duration,
}

impl WaitPolicy {
    /// Creates a wait policy.
    #[must_use]
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Creates a wait policy from whole seconds.
    #[must_use]
    pub fn from_secs(poll_interval: u64, timeout: u64) -> Self {
        Self::new(Duration::from_secs(poll_interval), Duration::from_secs(timeout))
    }
}

/// What a completed wait observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitReport {
    /// Number of probe calls.
    pub polls: u32,
    /// Time spent waiting.
    pub waited: Duration,
}

/// Waits for resources to converge.
#[derive(Debug, Clone)]
pub struct ReadinessWaiter {
    cancel: Arc<CancellationToken>,
}

impl ReadinessWaiter {
    /// Creates a waiter observing `cancel` between polls.
    #[must_use]
    pub fn new(cancel: Arc<CancellationToken>) -> Self {
        Self { cancel }
    }

    /// Waits until the resource is `Ready`.
    ///
    /// # Errors
    ///
    /// - `ReadinessFailed` on the first `Failed` observation.
    /// - `Timeout` if the deadline passes while `Absent`, `Pending` or erroring.
    /// - `Cancelled` if the token fires between polls.
    pub async fn await_ready(
        &self,
        probe: &dyn ResourceProbe,
        resource: &ResourceId,
        policy: WaitPolicy,
    ) -> DeployResult<WaitReport> {
        let (state, report) = self
            .poll_until(probe, resource, policy, ResourceState::is_terminal)
            .await?;
        match state {
            ResourceState::Failed { reason } => Err(DeployError::ReadinessFailed {
                resource: resource.clone(),
                reason,
            }),
            _ => Ok(report),
        }
    }

    /// Returns the first state the probe reports without error.
    ///
    /// # Errors
    ///
    /// `Timeout` if every probe fails until the deadline, or `Cancelled`.
    pub async fn first_observation(
        &self,
        probe: &dyn ResourceProbe,
        resource: &ResourceId,
        policy: WaitPolicy,
    ) -> DeployResult<ResourceState> {
        let (state, _) = self.poll_until(probe, resource, policy, |_| true).await?;
        Ok(state)
    }

    async fn poll_until(
        &self,
        probe: &dyn ResourceProbe,
        resource: &ResourceId,
        policy: WaitPolicy,
        accept: impl Fn(&ResourceState) -> bool + Send,
    ) -> DeployResult<(ResourceState, WaitReport)> {
        let started = Instant::now();
        let deadline = match started.checked_add(policy.timeout) {
            Some(deadline) if !policy.poll_interval.is_zero() => deadline,
            _ => return Err(unusable_policy(resource, policy).into()),
        };
        let mut polls = 0_u32;
        let mut last_state = "not observed".to_string();

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            polls += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, probe.probe(resource)).await {
                Ok(Ok(state)) => {
                    debug!(resource = %resource, state = %state, poll = polls, "Probed resource");
                    if accept(&state) {
                        let report = WaitReport {
                            polls,
                            waited: started.elapsed(),
                        };
                        return Ok((state, report));
                    }
                    last_state = state.to_string();
                }
                Ok(Err(err)) => {
                    warn!(resource = %resource, error = %err, poll = polls, "Probe failed, retrying");
                    last_state = format!("probe error: {err}");
                }
                Err(_) => {
                    warn!(resource = %resource, poll = polls, "Probe did not return before the deadline");
                    last_state = "probe timed out".to_string();
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DeployError::Timeout {
                    resource: resource.clone(),
                    waited: started.elapsed(),
                    last_state,
                });
            }

            tokio::select! {
                () = tokio::time::sleep(policy.poll_interval.min(remaining)) => {}
                () = self.cancel.cancelled() => return Err(self.cancelled()),
            }
        }
    }

    fn cancelled(&self) -> DeployError {
        DeployError::Cancelled {
            reason: self
                .cancel
                .reason()
                .unwrap_or_else(|| "cancelled".to_string()),
        }
    }
}

fn unusable_policy(resource: &ResourceId, policy: WaitPolicy) -> PreconditionError {
    PreconditionError::new(format!(
        "Cannot wait for {resource}: poll every {}s for {}s",
        policy.poll_interval.as_secs(),
        policy.timeout.as_secs()
    ))
    .with_error_info(
        ContractErrorInfo::new("DEPLOY-011-INVALID_WAIT", "Invalid readiness wait")
            .with_fix_hint("Use a non-zero poll interval and a timeout the clock can represent."),
    )
}
