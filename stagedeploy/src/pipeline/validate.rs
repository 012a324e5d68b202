//! Static validation of a stage sequence.
//!
//! Runs before any adapter call. Every failure is a `PreconditionError`
//! carrying a `DEPLOY-*` code.

use super::spec::StageSpec;
use crate::adapters::Manifest;
use crate::errors::{ContractErrorInfo, CycleDetectedError, PreconditionError};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static DNS_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid DNS label regex"));

const DNS_LABEL_MAX: usize = 63;

/// Shortest allowed poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Longest allowed readiness timeout.
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Validates the sequence, including local file preconditions.
///
/// # Errors
///
/// Returns the first `PreconditionError` found.
pub fn validate(specs: &[StageSpec]) -> Result<(), PreconditionError> {
    validate_graph(specs)?;
    validate_files(specs)
}

/// Validates names and the dependency graph only.
///
/// # Errors
///
/// Returns the first `PreconditionError` found.
pub fn validate_graph(specs: &[StageSpec]) -> Result<(), PreconditionError> {
    if specs.is_empty() {
        return Err(precondition(
            "DEPLOY-001-EMPTY",
            "Cannot run an empty stage sequence",
            "Enable at least one stage.",
            Vec::new(),
        ));
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, spec) in specs.iter().enumerate() {
        if positions.insert(spec.name.as_str(), index).is_some() {
            return Err(precondition(
                "DEPLOY-002-DUPLICATE",
                format!("Stage '{}' appears more than once", spec.name),
                "Give every stage a unique name.",
                vec![spec.name.clone()],
            ));
        }
        if spec.dependencies.contains(&spec.name) {
            return Err(precondition(
                "DEPLOY-010-SELF_DEP",
                format!("Stage '{}' cannot depend on itself", spec.name),
                "Remove the stage from its own dependency list.",
                vec![spec.name.clone()],
            ));
        }
    }

    for spec in specs.iter().filter(|s| s.enabled) {
        check_names(spec)?;
        check_wait(spec)?;
    }

    for spec in specs {
        if let Some(missing) = spec.dependencies.iter().find(|d| !positions.contains_key(d.as_str())) {
            return Err(precondition(
                "DEPLOY-003-MISSING_DEP",
                format!("Stage '{}' depends on '{missing}' which is not in the sequence", spec.name),
                format!("Add a '{missing}' stage or remove the dependency."),
                vec![spec.name.clone(), missing.clone()],
            ));
        }
    }

    detect_cycles(specs).map_err(PreconditionError::from)?;

    let by_name: HashMap<&str, &StageSpec> = specs.iter().map(|s| (s.name.as_str(), s)).collect();
    for (index, spec) in specs.iter().enumerate() {
        for dep in &spec.dependencies {
            if positions[dep.as_str()] > index {
                return Err(precondition(
                    "DEPLOY-004-FORWARD_REF",
                    format!("Stage '{}' depends on '{dep}' which runs after it", spec.name),
                    format!("Move '{dep}' before '{}'.", spec.name),
                    vec![spec.name.clone(), dep.clone()],
                ));
            }
            if spec.enabled && !by_name[dep.as_str()].enabled {
                return Err(precondition(
                    "DEPLOY-009-DISABLED_DEP",
                    format!("Stage '{}' depends on disabled stage '{dep}'", spec.name),
                    format!("Enable '{dep}' or disable '{}'.", spec.name),
                    vec![spec.name.clone(), dep.clone()],
                ));
            }
        }

        if !spec.enabled {
            continue;
        }
        for (stage, key) in spec.params.required_inputs() {
            if !spec.dependencies.contains(*stage) {
                return Err(precondition(
                    "DEPLOY-006-UNDECLARED_INPUT",
                    format!(
                        "Stage '{}' reads '{stage}.{key}' but does not declare '{stage}' as a dependency",
                        spec.name
                    ),
                    format!("Add '{stage}' to the dependencies of '{}'.", spec.name),
                    vec![spec.name.clone(), (*stage).to_string()],
                ));
            }
        }
    }

    Ok(())
}

/// Checks that every local file an enabled stage reads exists.
///
/// # Errors
///
/// `DEPLOY-008-MISSING_FILE` for the first missing file.
pub fn validate_files(specs: &[StageSpec]) -> Result<(), PreconditionError> {
    for spec in specs.iter().filter(|s| s.enabled) {
        for (field, path) in spec.params.local_files() {
            if !path.is_file() {
                return Err(PreconditionError::new(format!(
                    "Stage '{}': {field} not found at {}",
                    spec.name,
                    path.display()
                ))
                .with_stages(vec![spec.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new("DEPLOY-008-MISSING_FILE", "Required local file is missing")
                        .with_fix_hint(format!("Create the file or set '{field}' to an existing path."))
                        .with_context_entry("path", path.display().to_string()),
                ));
            }
        }
        for (field, path, expected) in spec.params.manifest_files() {
            check_manifest_kind(spec, field, path, expected)?;
        }
    }
    Ok(())
}

fn check_manifest_kind(
    spec: &StageSpec,
    field: &str,
    path: &Path,
    expected: &str,
) -> Result<(), PreconditionError> {
    let found = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|source| Manifest::from_yaml_str(&source).map_err(|e| e.diagnostic))
        .map(|manifest| manifest.kind().map(str::to_string));
    let problem = match found {
        Ok(Some(kind)) if kind == expected => return Ok(()),
        Ok(Some(kind)) => format!("holds a {kind}, expected a {expected}"),
        Ok(None) => format!("has no kind, expected a {expected}"),
        Err(diagnostic) => format!("cannot be read as a manifest: {diagnostic}"),
    };
    Err(PreconditionError::new(format!(
        "Stage '{}': {field} at {} {problem}",
        spec.name,
        path.display()
    ))
    .with_stages(vec![spec.name.clone()])
    .with_error_info(
        ContractErrorInfo::new("DEPLOY-012-MANIFEST_KIND", "Local manifest has the wrong kind")
            .with_fix_hint(format!("Point '{field}' at a single {expected} manifest."))
            .with_context_entry("path", path.display().to_string()),
    ))
}

/// Returns true if `name` is a valid DNS-1123 label.
#[must_use]
pub fn is_dns_label(name: &str) -> bool {
    name.len() <= DNS_LABEL_MAX && DNS_LABEL_RE.is_match(name)
}

fn check_names(spec: &StageSpec) -> Result<(), PreconditionError> {
    for (field, value) in spec.params.resource_names() {
        if !is_dns_label(value) {
            return Err(PreconditionError::new(format!(
                "Stage '{}': {field} '{value}' is not a valid DNS-1123 label",
                spec.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new("DEPLOY-007-INVALID_NAME", "Invalid resource name")
                    .with_fix_hint("Use at most 63 lowercase letters, digits or '-', starting and ending with an alphanumeric.")
                    .with_context_entry("field", field),
            ));
        }
    }
    Ok(())
}

fn check_wait(spec: &StageSpec) -> Result<(), PreconditionError> {
    let policy = spec.params.wait();
    let problem = if policy.poll_interval < MIN_POLL_INTERVAL {
        "poll_interval_secs must be at least 1"
    } else if policy.timeout < policy.poll_interval {
        "timeout_secs must be at least poll_interval_secs"
    } else if policy.timeout > MAX_WAIT_TIMEOUT {
        "timeout_secs must be at most 86400"
    } else {
        return Ok(());
    };
    Err(PreconditionError::new(format!("Stage '{}': {problem}", spec.name))
        .with_stages(vec![spec.name.clone()])
        .with_error_info(
            ContractErrorInfo::new("DEPLOY-011-INVALID_WAIT", "Invalid readiness wait")
                .with_fix_hint("Set wait.poll_interval_secs >= 1 and poll_interval_secs <= wait.timeout_secs <= 86400.")
                .with_context_entry("poll_interval_secs", policy.poll_interval.as_secs().to_string())
                .with_context_entry("timeout_secs", policy.timeout.as_secs().to_string()),
        ))
}

fn precondition(
    code: &str,
    message: impl Into<String>,
    hint: impl Into<String>,
    stages: Vec<String>,
) -> PreconditionError {
    let message = message.into();
    PreconditionError::new(message.clone())
        .with_stages(stages)
        .with_error_info(ContractErrorInfo::new(code, message).with_fix_hint(hint))
}

fn detect_cycles(specs: &[StageSpec]) -> Result<(), CycleDetectedError> {
    let graph: HashMap<&str, &StageSpec> = specs.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for spec in specs {
        if !visited.contains(spec.name.as_str()) {
            if let Some(cycle) = dfs_cycle(&graph, &spec.name, &mut visited, &mut rec_stack, &mut path) {
                return Err(CycleDetectedError::new(cycle));
            }
        }
    }
    Ok(())
}

fn dfs_cycle<'a>(
    graph: &HashMap<&'a str, &'a StageSpec>,
    node: &'a str,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(spec) = graph.get(node) {
        for dep in &spec.dependencies {
            let dep = dep.as_str();
            if !visited.contains(dep) {
                if let Some(cycle) = dfs_cycle(graph, dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(dep) {
                let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| (*s).to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
        }
    }

    path.pop();
    rec_stack.remove(node);
    None
}
