//! `stagedeploy up`: run the deployment.

use crate::shell::{self, Shell};
use anyhow::bail;
use stagedeploy::cancellation::CancellationToken;
use stagedeploy::events::LoggingEventSink;
use stagedeploy::pipeline::Orchestrator;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Runs every stage in order and prints the per-stage report.
pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = super::load(config_path)?;
    let cancel = Arc::new(CancellationToken::new());
    cancel_on_interrupt(cancel.clone());

    let orchestrator = Orchestrator::new(
        shell::adapters(Shell),
        Arc::new(LoggingEventSink::info()),
        cancel,
    );
    let outcome = orchestrator
        .run(&config.stage_specs())
        .await
        .map_err(|e| super::precondition(&e))?;

    println!("{outcome}");
    if !outcome.is_success() {
        bail!("deployment of {} did not complete", config.name);
    }
    Ok(())
}

/// Cancels `token` on Ctrl-C. The run stops at the next safe point.
fn cancel_on_interrupt(token: Arc<CancellationToken>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next safe point");
            token.cancel("interrupted by operator");
        }
    });
}
