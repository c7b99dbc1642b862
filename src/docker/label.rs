//! The label store: Docker container labels as the sole persistence layer.
//!
//! Every container in an environment carries the full label set, so a
//! [`WorktreeEnv`] can be reconstructed from any one of them. There is no
//! state file; the tool stays idempotent across crashes and reinstalls at
//! the cost of asking Docker for every query. Labels are written once at
//! container creation and never mutated.

use crate::error::{Error, Result};
use crate::model::{PortAllocation, Protocol, WorktreeEnv, WorktreeStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Common prefix namespacing all labels owned by this tool.
pub const LABEL_PREFIX: &str = "worktree.";

pub const LABEL_MANAGED_BY: &str = "worktree.managed-by";
pub const LABEL_NAME: &str = "worktree.name";
pub const LABEL_BRANCH: &str = "worktree.branch";
pub const LABEL_WORKTREE_PATH: &str = "worktree.worktree-path";
pub const LABEL_SOURCE_REPO: &str = "worktree.source-repo";
pub const LABEL_CONFIG_PATTERN: &str = "worktree.config-pattern";
pub const LABEL_CREATED_AT: &str = "worktree.created-at";

/// Per-port labels: `worktree.original-port.<containerPort>` = host port.
pub const LABEL_PORT_PREFIX: &str = "worktree.original-port.";

/// Value of the managed-by label on every container this tool creates.
pub const MANAGED_BY_VALUE: &str = "worktree-container";

/// Build the label map for an environment. A `BTreeMap` keeps iteration
/// order deterministic, which the runArgs label injection depends on.
///
/// Port allocations become one label each. Protocol is implicit tcp; a
/// future extension may encode it separately.
pub fn build_labels(env: &WorktreeEnv) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
        (LABEL_NAME.to_string(), env.name.clone()),
        (LABEL_BRANCH.to_string(), env.branch.clone()),
        (
            LABEL_WORKTREE_PATH.to_string(),
            env.worktree_path.display().to_string(),
        ),
        (
            LABEL_SOURCE_REPO.to_string(),
            env.source_repo_path.display().to_string(),
        ),
        (
            LABEL_CONFIG_PATTERN.to_string(),
            env.config_pattern.to_string(),
        ),
        (
            LABEL_CREATED_AT.to_string(),
            env.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    ]);

    for alloc in &env.port_allocations {
        labels.insert(
            port_label(alloc.container_port),
            alloc.host_port.to_string(),
        );
    }

    labels
}

/// Label key for one container port.
pub fn port_label(container_port: u16) -> String {
    format!("{LABEL_PORT_PREFIX}{container_port}")
}

/// Reconstruct a [`WorktreeEnv`] from a container's labels — the inverse of
/// [`build_labels`]. All seven base labels are required; absence yields an
/// error naming the missing keys collectively. Status is not persisted and
/// comes back as `Stopped`; callers recompute it from observed state.
pub fn parse_labels(labels: &HashMap<String, String>) -> Result<WorktreeEnv> {
    const REQUIRED: [&str; 7] = [
        LABEL_MANAGED_BY,
        LABEL_NAME,
        LABEL_BRANCH,
        LABEL_WORKTREE_PATH,
        LABEL_SOURCE_REPO,
        LABEL_CONFIG_PATTERN,
        LABEL_CREATED_AT,
    ];

    let missing: Vec<&str> = REQUIRED
        .iter()
        .copied()
        .filter(|key| !labels.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "missing required Docker labels: {}",
            missing.join(", ")
        )));
    }

    let managed_by = &labels[LABEL_MANAGED_BY];
    if managed_by != MANAGED_BY_VALUE {
        return Err(Error::Validation(format!(
            "label {LABEL_MANAGED_BY} has unexpected value {managed_by:?} (expected {MANAGED_BY_VALUE:?})"
        )));
    }

    let config_pattern = labels[LABEL_CONFIG_PATTERN].parse()?;

    let created_at = DateTime::parse_from_rfc3339(&labels[LABEL_CREATED_AT])
        .map_err(|e| {
            Error::Validation(format!(
                "invalid label {LABEL_CREATED_AT}={:?}: {e}",
                labels[LABEL_CREATED_AT]
            ))
        })?
        .with_timezone(&Utc);

    Ok(WorktreeEnv {
        name: labels[LABEL_NAME].clone(),
        branch: labels[LABEL_BRANCH].clone(),
        worktree_path: PathBuf::from(&labels[LABEL_WORKTREE_PATH]),
        source_repo_path: PathBuf::from(&labels[LABEL_SOURCE_REPO]),
        status: WorktreeStatus::Stopped,
        config_pattern,
        containers: Vec::new(),
        port_allocations: parse_port_labels(labels)?,
        created_at,
    })
}

/// Extract port allocations from the `worktree.original-port.*` labels.
/// Both the key suffix and the value must parse as port numbers.
pub fn parse_port_labels(labels: &HashMap<String, String>) -> Result<Vec<PortAllocation>> {
    let mut allocations = Vec::new();

    for (key, value) in labels {
        let Some(suffix) = key.strip_prefix(LABEL_PORT_PREFIX) else {
            continue;
        };
        let container_port: u16 = suffix.parse().map_err(|_| {
            Error::Validation(format!("invalid container port in label key {key:?}"))
        })?;
        let host_port: u16 = value.parse().map_err(|_| {
            Error::Validation(format!("invalid host port in label {key}={value:?}"))
        })?;

        allocations.push(PortAllocation {
            service_name: String::new(),
            container_port,
            host_port,
            protocol: Protocol::Tcp,
            label: None,
        });
    }

    // HashMap iteration order is arbitrary; sort so reconstructed
    // environments render identically across runs.
    allocations.sort_by_key(|a| a.container_port);
    Ok(allocations)
}

/// The (key, value) filter that restricts a Docker-side container listing
/// to containers managed by this tool.
pub fn filter_label() -> (&'static str, &'static str) {
    (LABEL_MANAGED_BY, MANAGED_BY_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfigPattern;
    use chrono::TimeZone;

    fn sample_env() -> WorktreeEnv {
        WorktreeEnv {
            name: "feature-auth".to_string(),
            branch: "feature/auth".to_string(),
            worktree_path: PathBuf::from("/home/dev/repo-feature-auth"),
            source_repo_path: PathBuf::from("/home/dev/repo"),
            status: WorktreeStatus::Running,
            config_pattern: ConfigPattern::ComposeMulti,
            containers: Vec::new(),
            port_allocations: vec![
                PortAllocation {
                    service_name: "app".to_string(),
                    container_port: 3000,
                    host_port: 13000,
                    protocol: Protocol::Tcp,
                    label: None,
                },
                PortAllocation {
                    service_name: "db".to_string(),
                    container_port: 5432,
                    host_port: 15432,
                    protocol: Protocol::Tcp,
                    label: None,
                },
            ],
            created_at: Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap(),
        }
    }

    fn as_hashmap(labels: &BTreeMap<String, String>) -> HashMap<String, String> {
        labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[test]
    fn build_emits_base_and_port_labels() {
        let labels = build_labels(&sample_env());
        assert_eq!(labels[LABEL_MANAGED_BY], MANAGED_BY_VALUE);
        assert_eq!(labels[LABEL_NAME], "feature-auth");
        assert_eq!(labels[LABEL_BRANCH], "feature/auth");
        assert_eq!(labels[LABEL_CONFIG_PATTERN], "compose-multi");
        assert_eq!(labels[LABEL_CREATED_AT], "2026-02-28T10:00:00Z");
        assert_eq!(labels["worktree.original-port.3000"], "13000");
        assert_eq!(labels["worktree.original-port.5432"], "15432");
        assert_eq!(labels.len(), 9);
    }

    #[test]
    fn round_trip_preserves_identity() {
        let env = sample_env();
        let parsed = parse_labels(&as_hashmap(&build_labels(&env))).unwrap();

        assert_eq!(parsed.name, env.name);
        assert_eq!(parsed.branch, env.branch);
        assert_eq!(parsed.worktree_path, env.worktree_path);
        assert_eq!(parsed.source_repo_path, env.source_repo_path);
        assert_eq!(parsed.config_pattern, env.config_pattern);
        assert_eq!(parsed.created_at, env.created_at);

        let pairs: Vec<(u16, u16)> = parsed
            .port_allocations
            .iter()
            .map(|a| (a.container_port, a.host_port))
            .collect();
        assert_eq!(pairs, vec![(3000, 13000), (5432, 15432)]);
    }

    #[test]
    fn missing_labels_reported_collectively() {
        let labels: HashMap<String, String> = [
            (LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
            (LABEL_NAME.to_string(), "x".to_string()),
        ]
        .into();
        let err = parse_labels(&labels).unwrap_err().to_string();
        assert!(err.contains(LABEL_BRANCH));
        assert!(err.contains(LABEL_WORKTREE_PATH));
        assert!(err.contains(LABEL_SOURCE_REPO));
        assert!(err.contains(LABEL_CONFIG_PATTERN));
        assert!(err.contains(LABEL_CREATED_AT));
        assert!(!err.contains("worktree.name,"));
    }

    #[test]
    fn foreign_managed_by_rejected() {
        let mut labels = as_hashmap(&build_labels(&sample_env()));
        labels.insert(LABEL_MANAGED_BY.to_string(), "someone-else".to_string());
        assert!(parse_labels(&labels).is_err());
    }

    #[test]
    fn invalid_pattern_rejected() {
        let mut labels = as_hashmap(&build_labels(&sample_env()));
        labels.insert(LABEL_CONFIG_PATTERN.to_string(), "kubernetes".to_string());
        assert!(parse_labels(&labels).is_err());
    }

    #[test]
    fn invalid_timestamp_rejected() {
        let mut labels = as_hashmap(&build_labels(&sample_env()));
        labels.insert(LABEL_CREATED_AT.to_string(), "yesterday".to_string());
        assert!(parse_labels(&labels).is_err());
    }

    #[test]
    fn malformed_port_labels_rejected() {
        let mut labels = as_hashmap(&build_labels(&sample_env()));
        labels.insert("worktree.original-port.abc".to_string(), "13000".to_string());
        assert!(parse_labels(&labels).is_err());

        let mut labels = as_hashmap(&build_labels(&sample_env()));
        labels.insert("worktree.original-port.8080".to_string(), "high".to_string());
        assert!(parse_labels(&labels).is_err());
    }

    #[test]
    fn no_port_labels_yields_empty_set() {
        let mut env = sample_env();
        env.port_allocations.clear();
        let parsed = parse_labels(&as_hashmap(&build_labels(&env))).unwrap();
        assert!(parsed.port_allocations.is_empty());
    }

    #[test]
    fn unrelated_labels_ignored() {
        let mut labels = as_hashmap(&build_labels(&sample_env()));
        labels.insert("com.docker.compose.service".to_string(), "app".to_string());
        labels.insert("maintainer".to_string(), "someone".to_string());
        let parsed = parse_labels(&labels).unwrap();
        assert_eq!(parsed.port_allocations.len(), 2);
    }

    #[test]
    fn filter_matches_managed_by() {
        let (key, value) = filter_label();
        assert_eq!(key, LABEL_MANAGED_BY);
        assert_eq!(value, MANAGED_BY_VALUE);
    }
}
