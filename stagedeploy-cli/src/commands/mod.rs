//! Subcommand implementations.

pub mod check;
pub mod teardown;
pub mod up;

use anyhow::{anyhow, Context};
use stagedeploy::config::{load_run_config, RunConfig};
use stagedeploy::errors::PreconditionError;
use std::path::Path;

/// Loads the run config, resolving its file paths against its directory.
pub fn load(path: &Path) -> anyhow::Result<RunConfig> {
    load_run_config(path).with_context(|| format!("loading {}", path.display()))
}

/// Renders a validation failure with its code, stages and fix hint.
pub fn precondition(err: &PreconditionError) -> anyhow::Error {
    let mut message = match err.code() {
        Some(code) => format!("[{code}] {err}"),
        None => err.to_string(),
    };
    if !err.stages.is_empty() {
        message.push_str(&format!(" (stages: {})", err.stages.join(", ")));
    }
    if let Some(info) = &err.error_info {
        for (key, value) in &info.context {
            message.push_str(&format!("\n  {key}: {value}"));
        }
        if let Some(hint) = &info.fix_hint {
            message.push_str(&format!("\n  hint: {hint}"));
        }
    }
    anyhow!(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagedeploy::errors::ContractErrorInfo;

    #[test]
    fn test_precondition_rendering() {
        let err = PreconditionError::new("Stage 'load-generator' depends on unknown stage 'queue'")
            .with_stages(vec!["load-generator".to_string()])
            .with_error_info(
                ContractErrorInfo::new("DEPLOY-003-MISSING_DEP", "Missing dependency")
                    .with_fix_hint("Add the stage or remove the dependency"),
            );

        let rendered = precondition(&err).to_string();

        assert!(rendered.starts_with("[DEPLOY-003-MISSING_DEP] Stage 'load-generator'"));
        assert!(rendered.contains("(stages: load-generator)"));
        assert!(rendered.ends_with("hint: Add the stage or remove the dependency"));
    }
}
