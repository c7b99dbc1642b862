//! Validation of the derived worktree-side configuration.
//!
//! After the copy-and-rewrite step, the worktree's `.devcontainer/` must be
//! usable by the Dev Container tooling: referenced Compose files and
//! Dockerfiles have to exist, and a Compose configuration needs its
//! `service` field. Relative references are resolved against the worktree's
//! `.devcontainer/` directory, where the checked-out tree provides files
//! that live outside `.devcontainer/` in the source repository.

use super::config::{parse_config, RawConfig};
use crate::error::{Error, Result};
use std::path::Path;

/// Check the rewritten configuration in a worktree's `.devcontainer/`.
/// Returns the list of problems found; an empty list means the derived
/// configuration is complete.
pub fn validate_worktree_config(devcontainer_dir: &Path) -> Result<Vec<String>> {
    let config_path = devcontainer_dir.join("devcontainer.json");
    let raw = std::fs::read_to_string(&config_path)
        .map_err(|_| Error::Validation(format!("{} not found", config_path.display())))?;
    let config = parse_config(&raw)?;

    Ok(collect_issues(devcontainer_dir, &config))
}

fn collect_issues(devcontainer_dir: &Path, config: &RawConfig) -> Vec<String> {
    let mut issues = Vec::new();

    if config.docker_compose_file.is_some() {
        if config.service.is_none() {
            issues.push(
                "service field is required when dockerComposeFile is specified".to_string(),
            );
        }
        for file in config.compose_files() {
            let path = devcontainer_dir.join(&file);
            if !path.is_file() {
                issues.push(format!("referenced Compose file not found: {file}"));
            }
        }
    } else if let Some(build) = &config.build {
        let dockerfile = build.dockerfile.as_deref().unwrap_or("Dockerfile");
        let path = devcontainer_dir.join(dockerfile);
        if !path.is_file() {
            issues.push(format!("referenced Dockerfile not found: {dockerfile}"));
        }
    }

    issues
}
