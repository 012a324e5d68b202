//! Demo deployment fixtures.

use std::fs;
use std::path::Path;

use crate::config::RunConfig;
use crate::pipeline::StageSpec;

/// Project ID used by fixtures.
pub const DEMO_PROJECT: &str = "demo-project";

const JOB_MANIFEST: &str = "\
apiVersion: batch/v1
kind: Job
metadata:
  name: vwap-loadgen
  namespace: default
spec:
  template:
    spec:
      containers:
        - name: loadgen
          image: voltdb/vwap-loadgen:latest
          envFrom:
            - configMapRef:
                name: vwap-loadgen-config
      restartPolicy: Never
";

/// Writes the demo's local files under `dir` and returns a config that
/// points at them.
///
/// # Panics
///
/// Panics if the files cannot be written.
#[must_use]
pub fn demo_config(dir: &Path) -> RunConfig {
    let files: [(&str, &[u8]); 5] = [
        ("license/license.xml", b"<license/>"),
        ("ddl/vwap_ddl.sql", b"CREATE TABLE DUMMY (X VARCHAR(1));"),
        ("jars/vwap_demo.jar", b"PK"),
        ("jars/vwap-demo-1.0-SNAPSHOT-voltsp-kafka-reader-stream.jar", b"PK"),
        ("yaml/vwap-loadgen-job.yaml", JOB_MANIFEST.as_bytes()),
    ];
    for (relative, contents) in files {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, contents).expect("write fixture file");
    }

    let mut config = RunConfig::new(DEMO_PROJECT);
    config.rebase_paths(dir);
    config
}

/// Returns the demo's five stages with their local files written under `dir`.
///
/// # Panics
///
/// Panics if the files cannot be written.
#[must_use]
pub fn demo_specs(dir: &Path) -> Vec<StageSpec> {
    demo_config(dir).stage_specs()
}
