//! Database statements with `sqlcmd`, run inside a database pod.

use super::{args, Shell};
use async_trait::async_trait;
use stagedeploy::adapters::{AdapterResult, DatabaseAdapter, DbConnection, StatementOutput};

const KUBECTL: &str = "kubectl";

/// SQL via `kubectl exec ... sqlcmd`.
#[derive(Debug, Clone, Copy)]
pub struct Sqlcmd {
    shell: Shell,
}

impl Sqlcmd {
    /// Creates the adapter.
    #[must_use]
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }
}

fn statement_args(connection: &DbConnection, sql: &str) -> Vec<String> {
    let mut args = args!["exec", connection.pod, "-n", connection.namespace, "--", "sqlcmd"];
    match connection.address.rsplit_once(':') {
        Some((host, port)) => args.extend(args![format!("--servers={host}"), format!("--port={port}")]),
        None => args.push(format!("--servers={}", connection.address)),
    }
    args.extend(args![
        format!("--query={sql}"),
        "--output-format=csv",
        "--output-skip-metadata",
    ]);
    args
}

/// Parses headerless CSV rows.
fn parse_rows(stdout: &str) -> StatementOutput {
    let rows = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split(',')
                .map(|field| field.trim().trim_matches('"').to_string())
                .collect()
        })
        .collect();
    StatementOutput { rows }
}

#[async_trait]
impl DatabaseAdapter for Sqlcmd {
    async fn execute_statement(&self, connection: &DbConnection, sql: &str) -> AdapterResult<StatementOutput> {
        let stdout = self
            .shell
            .run(KUBECTL, &statement_args(connection, sql), None)
            .await?;
        Ok(parse_rows(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_statement_args() {
        let connection = DbConnection {
            namespace: "voltdb".to_string(),
            pod: "volt-vwap-voltdb-cluster-0".to_string(),
            address: "volt-vwap-voltdb-cluster-client.voltdb.svc.cluster.local:21212".to_string(),
        };

        let args = statement_args(&connection, "SELECT COUNT(*) FROM DUMMY;");

        assert_eq!(
            args,
            vec![
                "exec",
                "volt-vwap-voltdb-cluster-0",
                "-n",
                "voltdb",
                "--",
                "sqlcmd",
                "--servers=volt-vwap-voltdb-cluster-client.voltdb.svc.cluster.local",
                "--port=21212",
                "--query=SELECT COUNT(*) FROM DUMMY;",
                "--output-format=csv",
                "--output-skip-metadata",
            ]
        );
    }

    #[test]
    fn test_parse_rows() {
        let out = parse_rows("1\n\n");
        assert_eq!(out.scalar(), Some("1"));
        let out = parse_rows("\"X\",2\n\"Y\",3\n");
        assert_eq!(out.rows, vec![vec!["X", "2"], vec!["Y", "3"]]);
        assert!(parse_rows("").rows.is_empty());
    }
}
