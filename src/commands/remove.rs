//! The `remove` command: tear an environment down completely.
//!
//! Compose environments come down with `docker compose down -v`, removing
//! containers, networks, and named volumes in one pass. The other patterns
//! force-remove each container. Unless `--keep-worktree`, the Git worktree
//! is removed against the source repository recorded in the labels.

use super::{compose_files_for, devcontainer_dir, find_environment};
use crate::docker::DockerClient;
use crate::error::{Error, Result};
use crate::model::WorktreeEnv;
use crate::worktree;
use serde::Serialize;
use std::io::BufRead;

pub struct RemoveOptions {
    pub name: String,
    pub force: bool,
    pub keep_worktree: bool,
    pub json: bool,
}

pub async fn run_remove(opts: RemoveOptions) -> Result<()> {
    let client = DockerClient::new()?;
    let env = find_environment(&client, &opts.name).await?;
    tracing::debug!(
        "found environment {:?} with {} containers",
        opts.name,
        env.containers.len()
    );

    if !opts.force && !confirm(&env, opts.keep_worktree)? {
        return Err(Error::Cancelled);
    }

    remove_containers(&client, &env).await?;

    let mut worktree_removed = false;
    if !opts.keep_worktree {
        match worktree::remove(&env.source_repo_path, &env.worktree_path, true).await {
            Ok(()) => worktree_removed = true,
            Err(e) => {
                // An already-deleted directory is fine; anything else is a
                // real git failure worth surfacing.
                if env.worktree_path.exists() {
                    return Err(e);
                }
                tracing::debug!("worktree directory already gone: {e}");
            }
        }
    }

    print_result(&env, worktree_removed, opts.json);
    Ok(())
}

async fn remove_containers(client: &DockerClient, env: &WorktreeEnv) -> Result<()> {
    if env.config_pattern.is_compose() {
        // An orphaned environment has lost its compose files along with the
        // worktree; fall back to removing the containers directly.
        match compose_files_for(env) {
            Ok(files) => {
                tracing::debug!("docker compose down -v for {:?}", env.name);
                client
                    .compose_down(&devcontainer_dir(env), &files, &env.name, true)
                    .await?;
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    "derived Compose configuration unavailable, removing containers directly: {e}"
                );
            }
        }
    }

    for container in &env.containers {
        tracing::debug!("removing container {}", container.container_name);
        client.remove_container(&container.container_id, true).await?;
    }
    Ok(())
}

/// Interactive confirmation. Reads one line from stdin; anything but
/// `y`/`yes` (or a closed stdin) declines.
fn confirm(env: &WorktreeEnv, keep_worktree: bool) -> Result<bool> {
    println!("About to remove worktree environment {:?}:", env.name);
    println!("  - {} container(s) will be removed", env.containers.len());
    if !keep_worktree {
        println!(
            "  - Git worktree at {} will be removed",
            env.worktree_path.display()
        );
    }
    print!("\nContinue? [y/N] ");
    use std::io::Write;
    std::io::stdout().flush().ok();

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) => Ok(false),
        Ok(_) => {
            let answer = line.trim().to_ascii_lowercase();
            Ok(answer == "y" || answer == "yes")
        }
        Err(e) => Err(Error::Io(e)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveResult<'a> {
    name: &'a str,
    action: &'static str,
    container_count: usize,
    worktree_removed: bool,
    worktree_path: String,
}

fn print_result(env: &WorktreeEnv, worktree_removed: bool, json: bool) {
    if json {
        let result = RemoveResult {
            name: &env.name,
            action: "removed",
            container_count: env.containers.len(),
            worktree_removed,
            worktree_path: env.worktree_path.display().to_string(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return;
    }

    println!("Removed worktree environment {:?}", env.name);
    println!("  Removed {} containers", env.containers.len());
    if worktree_removed {
        println!("  Removed git worktree at {}", env.worktree_path.display());
    }
}
