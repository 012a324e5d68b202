//! Run config YAML parsing with environment variable substitution.

use super::types::RunConfig;
use regex::Regex;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Errors loading a run config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// The config path.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// One or more `${VAR}` references are unset.
    #[error("Missing environment variable(s): {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// The document is not valid.
    #[error("Failed to parse run config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Substitutes `${VAR_NAME}` with environment variable values.
///
/// Substituted values are not scanned again.
///
/// # Errors
///
/// `ConfigError::MissingEnv` listing every unset variable.
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing = Vec::new();
    let result = substitute(input, &mut missing);
    missing_env(missing)?;
    Ok(result)
}

fn substitute(input: &str, missing: &mut Vec<String>) -> String {
    ENV_VAR_RE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| {
                missing.push(caps[1].to_string());
                String::new()
            })
        })
        .into_owned()
}

fn missing_env(mut missing: Vec<String>) -> Result<(), ConfigError> {
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    missing.dedup();
    Err(ConfigError::MissingEnv(missing))
}

/// Substitutes inside string scalars only. Values always stay strings, so
/// YAML syntax in a value cannot change the document's structure.
fn substitute_value(value: &mut Value, missing: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            if ENV_VAR_RE.is_match(text) {
                *text = substitute(text, missing);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                substitute_value(item, missing);
            }
        }
        Value::Mapping(map) => {
            for item in map.values_mut() {
                substitute_value(item, missing);
            }
        }
        Value::Tagged(tagged) => substitute_value(&mut tagged.value, missing),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Parses a run config string, then substitutes `${VAR}` references in its
/// string values.
///
/// # Errors
///
/// Returns an error if the YAML is invalid or a referenced variable is unset.
pub fn parse_run_config_str(yaml: &str) -> Result<RunConfig, ConfigError> {
    let mut document: Value = serde_yaml::from_str(yaml)?;
    let mut missing = Vec::new();
    substitute_value(&mut document, &mut missing);
    missing_env(missing)?;
    Ok(serde_yaml::from_value(document)?)
}

/// Loads a run config file. Relative paths inside it resolve against the
/// file's directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_run_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse_run_config_str(&content)?;
    if let Some(base) = path.parent() {
        config.rebase_paths(base);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SD_TEST_REGISTRY_USER", "demo-user");
        let result = substitute_env_vars("username: ${SD_TEST_REGISTRY_USER}").unwrap();
        assert_eq!(result, "username: demo-user");
        std::env::remove_var("SD_TEST_REGISTRY_USER");
    }

    #[test]
    fn test_substituted_values_not_rescanned() {
        std::env::set_var("SD_TEST_NESTED", "${SD_TEST_UNSET_INNER}");
        let result = substitute_env_vars("value: ${SD_TEST_NESTED}").unwrap();
        assert_eq!(result, "value: ${SD_TEST_UNSET_INNER}");
        std::env::remove_var("SD_TEST_NESTED");
    }

    #[test]
    fn test_missing_env_vars_all_reported() {
        let err = substitute_env_vars("${SD_MISSING_X} and ${SD_MISSING_Y}").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SD_MISSING_X"));
        assert!(message.contains("SD_MISSING_Y"));
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = parse_run_config_str("cluster:\n  project: demo-project\n").unwrap();
        assert_eq!(config.cluster.project, "demo-project");
        assert_eq!(config.cluster.name, "voltsp");
        assert_eq!(config.broker.release, "redpanda-cluster");
        assert!(config.registry.is_none());
    }

    #[test]
    fn test_parse_overrides_and_registry() {
        std::env::set_var("SD_TEST_REGISTRY_PASSWORD", "from-env");
        let yaml = r"
name: vwap-staging
registry:
  username: demo
  password: ${SD_TEST_REGISTRY_PASSWORD}
cluster:
  project: demo-project
  enabled: false
broker:
  replicas: 1
  wait:
    poll_interval_secs: 5
    timeout_secs: 120
load_generator:
  tps: 50
";
        let config = parse_run_config_str(yaml).unwrap();
        std::env::remove_var("SD_TEST_REGISTRY_PASSWORD");

        let registry = config.registry.unwrap();
        assert_eq!(registry.server, "docker.io");
        assert_eq!(registry.password, "from-env");
        assert!(!config.cluster.enabled);
        assert_eq!(config.broker.replicas, 1);
        assert_eq!(config.broker.wait.timeout_secs, 120);
        assert_eq!(config.load_generator.tps, 50);
        assert_eq!(config.load_generator.clients, 1);
    }

    fn parsed_password(var: &str, value: &str) -> String {
        std::env::set_var(var, value);
        let yaml = format!("registry:\n  username: demo\n  password: ${{{var}}}\n  email: ops@example.com\n");
        let config = parse_run_config_str(&yaml);
        std::env::remove_var(var);
        config.unwrap().registry.unwrap().password
    }

    #[test]
    fn test_yaml_syntax_in_env_value_is_kept_verbatim() {
        assert_eq!(parsed_password("SD_TEST_PW_COMMENT", "hunter2 #tail"), "hunter2 #tail");
        assert_eq!(parsed_password("SD_TEST_PW_COLON", "s3cret: x"), "s3cret: x");
        assert_eq!(parsed_password("SD_TEST_PW_QUOTE", "\"'quoted'"), "\"'quoted'");
    }

    #[test]
    fn test_newline_in_env_value_cannot_add_keys() {
        std::env::set_var("SD_TEST_PW_NEWLINE", "s3cret\n  email: evil@x");
        let config = parse_run_config_str(
            "registry:\n  username: demo\n  password: ${SD_TEST_PW_NEWLINE}\n  email: ops@example.com\n",
        );
        std::env::remove_var("SD_TEST_PW_NEWLINE");

        let registry = config.unwrap().registry.unwrap();
        assert_eq!(registry.password, "s3cret\n  email: evil@x");
        assert_eq!(registry.email.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_missing_env_var_in_document_is_reported() {
        let err = parse_run_config_str("registry:\n  username: ${SD_MISSING_USER}\n  password: ${SD_MISSING_PW}\n")
            .unwrap_err();
        match err {
            ConfigError::MissingEnv(vars) => assert_eq!(vars, vec!["SD_MISSING_PW", "SD_MISSING_USER"]),
            other => panic!("expected missing env, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_types() {
        let err = parse_run_config_str("broker:\n  replicas: three\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "cluster:\n  project: p\ndatabase:\n  ddl_file: schema.sql").unwrap();

        let config = load_run_config(&path).unwrap();
        assert_eq!(config.database.ddl_file, dir.path().join("schema.sql"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_run_config(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
