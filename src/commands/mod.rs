//! Per-command orchestration. Each subcommand lives in its own module;
//! shared discovery helpers live here.

pub mod create;
pub mod doctor;
pub mod list;
pub mod remove;
pub mod restart;
pub mod start;
pub mod stop;

pub use create::run_create;
pub use doctor::run_doctor;
pub use list::run_list;
pub use remove::run_remove;
pub use restart::run_restart;
pub use start::run_start;
pub use stop::run_stop;

use crate::devcontainer;
use crate::docker::{self, DockerClient};
use crate::error::{Error, Result};
use crate::model::WorktreeEnv;
use std::path::PathBuf;

/// Look up one environment by name from the label store. Returns the
/// reconstructed environment with its containers attached.
pub(crate) async fn find_environment(client: &DockerClient, name: &str) -> Result<WorktreeEnv> {
    let containers = client.list_managed().await?;
    let mut groups = docker::group_by_env(containers);

    let group = groups
        .remove(name)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| Error::EnvNotFound(name.to_string()))?;

    docker::build_env(name, group)
}

/// Directory holding the environment's derived configuration.
pub(crate) fn devcontainer_dir(env: &WorktreeEnv) -> PathBuf {
    env.worktree_path.join(".devcontainer")
}

/// Reconstruct the ordered `-f` list for Compose invocations from the
/// worktree's rewritten devcontainer.json, whose `dockerComposeFile` array
/// ends with the generated override.
pub(crate) fn compose_files_for(env: &WorktreeEnv) -> Result<Vec<String>> {
    let config_path = devcontainer_dir(env).join("devcontainer.json");
    let config = devcontainer::load_config(&config_path).map_err(|e| {
        Error::Validation(format!(
            "cannot read derived configuration for {:?}: {e}",
            env.name
        ))
    })?;

    let files = config.compose_files();
    if files.is_empty() {
        return Err(Error::Validation(format!(
            "derived configuration for {:?} lists no Compose files",
            env.name
        )));
    }
    Ok(files)
}
