//! Shell-backed adapter implementations.
//!
//! Every adapter drives an external CLI through [`Shell`]. Payloads that can
//! carry credentials are passed on stdin, never as arguments.

/// Builds an owned argument list.
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($arg.to_string()),*]
    };
}
pub(crate) use args;

mod gcloud;
mod helm;
mod kubectl;
mod rpk;
mod sqlcmd;

use stagedeploy::adapters::{AdapterResult, Adapters};
use stagedeploy::errors::AdapterError;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub use gcloud::Gcloud;
pub use helm::Helm;
pub use kubectl::Kubectl;
pub use rpk::Rpk;
pub use sqlcmd::Sqlcmd;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct Output {
    /// Whether the command exited with status 0.
    pub success: bool,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl Output {
    /// Returns stderr, or stdout when stderr is empty.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs external commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shell;

impl Shell {
    /// Runs `program` and captures its output whatever the exit status.
    pub async fn output(&self, program: &str, args: &[String], stdin: Option<&str>) -> AdapterResult<Output> {
        let operation = operation(program, args);
        debug!(program, args = ?args, "Running command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches only the orchestrator.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AdapterError::new(&operation, format!("{program} not found on PATH"))
                } else {
                    AdapterError::new(&operation, e.to_string())
                }
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| AdapterError::new(&operation, e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AdapterError::new(&operation, e.to_string()))?;

        Ok(Output {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Runs `program` and returns stdout, failing on a non-zero exit.
    pub async fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> AdapterResult<String> {
        let output = self.output(program, args, stdin).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(AdapterError::new(operation(program, args), output.diagnostic()))
        }
    }
}

/// `program` plus its leading subcommand words, e.g. `helm upgrade`.
fn operation(program: &str, args: &[String]) -> String {
    let words: Vec<&str> = args
        .iter()
        .take_while(|a| !a.starts_with('-'))
        .take(3)
        .map(String::as_str)
        .collect();
    if words.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", words.join(" "))
    }
}

/// Wires every adapter role to its shell implementation.
#[must_use]
pub fn adapters(shell: Shell) -> Adapters {
    Adapters {
        cluster: Arc::new(Gcloud::new(shell)),
        releases: Arc::new(Helm::new(shell)),
        kube: Arc::new(Kubectl::new(shell)),
        database: Arc::new(Sqlcmd::new(shell)),
        topics: Arc::new(Rpk::new(shell)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_name() {
        assert_eq!(
            operation("gcloud", &args!["container", "clusters", "describe", "voltsp", "--zone", "z"]),
            "gcloud container clusters describe"
        );
        assert_eq!(operation("helm", &args!["status", "pipeline1", "-n", "voltdb"]), "helm status pipeline1");
        assert_eq!(operation("kubectl", &args!["-n", "x"]), "kubectl");
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let out = Output {
            success: false,
            stdout: "partial".to_string(),
            stderr: "Error: boom\n".to_string(),
        };
        assert_eq!(out.diagnostic(), "Error: boom");
        let out = Output {
            stderr: "  ".to_string(),
            ..out
        };
        assert_eq!(out.diagnostic(), "partial");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_is_piped() {
        let stdout = Shell.run("cat", &[], Some("kind: Secret\n")).await.unwrap();
        assert_eq!(stdout, "kind: Secret\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_program() {
        let err = Shell
            .run("stagedeploy-no-such-tool", &args!["version"], None)
            .await
            .unwrap_err();
        assert!(err.diagnostic.contains("not found on PATH"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_runs_in_its_own_process_group() {
        let child = Shell
            .run("sh", &args!["-c", "echo $$; ps -o pgid= -p $$"], None)
            .await
            .unwrap();
        let own = Shell
            .run("ps", &args!["-o", "pgid=", "-p", std::process::id()], None)
            .await
            .unwrap();

        let mut lines = child.lines().map(str::trim);
        let (pid, pgid) = (lines.next().unwrap(), lines.next().unwrap());
        assert_eq!(pid, pgid);
        assert_ne!(pgid, own.trim());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let err = Shell
            .run("sh", &args!["-c", "echo nope >&2; exit 3"], None)
            .await
            .unwrap_err();
        assert_eq!(err.diagnostic, "nope");
    }
}
