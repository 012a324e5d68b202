//! `stagedeploy check`: validate and print the plan.

use anyhow::Context;
use stagedeploy::pipeline::plan;
use std::path::Path;

/// Validates the config and prints what `up` would do. Calls no external tool.
pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load(config_path)?;
    let plan = plan(&config.stage_specs()).map_err(|e| super::precondition(&e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan).context("rendering plan")?);
    } else {
        print!("{plan}");
    }
    Ok(())
}
