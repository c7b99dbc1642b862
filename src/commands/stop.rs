//! The `stop` command: gracefully stop an environment's containers,
//! preserving their state for a later `start`.

use super::{compose_files_for, devcontainer_dir, find_environment};
use crate::docker::DockerClient;
use crate::error::Result;
use crate::model::WorktreeEnv;
use serde::Serialize;

pub async fn run_stop(name: &str, json: bool) -> Result<()> {
    let client = DockerClient::new()?;
    let env = find_environment(&client, name).await?;
    tracing::debug!(
        "found environment {name:?} with {} containers",
        env.containers.len()
    );

    stop_environment(&client, &env).await?;

    print_result(&env, json);
    Ok(())
}

/// Pattern-specific shutdown. Compose handles service ordering itself;
/// the other patterns stop their containers one by one. Shared with
/// `restart`.
pub(crate) async fn stop_environment(client: &DockerClient, env: &WorktreeEnv) -> Result<()> {
    if env.config_pattern.is_compose() {
        let files = compose_files_for(env)?;
        tracing::debug!("docker compose stop for {:?}", env.name);
        client
            .compose_stop(&devcontainer_dir(env), &files, &env.name)
            .await?;
    } else {
        for container in &env.containers {
            tracing::debug!("stopping container {}", container.container_name);
            client.stop_container(&container.container_id).await?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopResult<'a> {
    name: &'a str,
    action: &'static str,
    container_count: usize,
}

fn print_result(env: &WorktreeEnv, json: bool) {
    if json {
        let result = StopResult {
            name: &env.name,
            action: "stopped",
            container_count: env.containers.len(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return;
    }

    println!(
        "Stopped worktree environment {:?} ({} containers)",
        env.name,
        env.containers.len()
    );
}
