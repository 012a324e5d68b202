//! `stagedeploy teardown`: remove what `up` created.

use crate::shell::{self, Shell};
use anyhow::bail;
use stagedeploy::pipeline::{teardown, TeardownOptions};
use std::path::Path;

/// Removes components in reverse order. The cluster is kept unless asked.
pub async fn run(config_path: &Path, include_cluster: bool) -> anyhow::Result<()> {
    let config = super::load(config_path)?;
    let report = teardown(
        &config.stage_specs(),
        &shell::adapters(Shell),
        TeardownOptions { include_cluster },
    )
    .await
    .map_err(|e| super::precondition(&e))?;

    print!("{report}");
    if !report.is_success() {
        bail!("teardown of {} stopped at the first failure", config.name);
    }
    Ok(())
}
