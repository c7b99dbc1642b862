//! Grouping managed containers into worktree environments and deriving
//! their aggregate status.

use super::label;
use crate::error::{Error, Result};
use crate::model::{ContainerInfo, WorktreeEnv, WorktreeStatus};
use std::collections::HashMap;
use std::path::Path;

/// Partition containers by their `worktree.name` label. Containers lacking
/// the label cannot be attributed to an environment and are silently
/// dropped (the daemon-side filter should prevent them from appearing).
pub fn group_by_env(containers: Vec<ContainerInfo>) -> HashMap<String, Vec<ContainerInfo>> {
    let mut groups: HashMap<String, Vec<ContainerInfo>> = HashMap::new();

    for container in containers {
        match container.labels.get(label::LABEL_NAME) {
            Some(name) if !name.is_empty() => {
                groups.entry(name.clone()).or_default().push(container);
            }
            _ => {}
        }
    }

    groups
}

/// Build a [`WorktreeEnv`] from one environment's container group. Labels
/// are read from the first container — every container in a group carries
/// the identical set. Status is recomputed from observed state.
pub fn build_env(env_name: &str, containers: Vec<ContainerInfo>) -> Result<WorktreeEnv> {
    let first = containers.first().ok_or_else(|| {
        Error::Validation(format!(
            "cannot build environment {env_name:?}: no containers provided"
        ))
    })?;

    let mut env = label::parse_labels(&first.labels).map_err(|e| {
        Error::Validation(format!("invalid labels for environment {env_name:?}: {e}"))
    })?;

    env.status = determine_status(&containers, &env.worktree_path);
    env.containers = containers;
    Ok(env)
}

/// Aggregate status of a container group.
///
/// A missing worktree directory wins even over running containers: the
/// environment is orphaned and the remaining containers are leftovers to
/// be removed. Otherwise one running container makes the environment
/// running; else it is stopped.
pub fn determine_status(containers: &[ContainerInfo], worktree_path: &Path) -> WorktreeStatus {
    if !worktree_path.exists() {
        return WorktreeStatus::Orphaned;
    }
    if containers.iter().any(|c| c.status == "running") {
        return WorktreeStatus::Running;
    }
    WorktreeStatus::Stopped
}
