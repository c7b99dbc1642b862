//! The `restart` command: stop an environment, then start it again.
//!
//! Once its own containers are down the environment's ports are free, so
//! the start-side port pre-check still guards against ports stolen by
//! other processes in the meantime.

use super::find_environment;
use super::start::start_environment;
use super::stop::stop_environment;
use crate::docker::DockerClient;
use crate::error::Result;
use serde::Serialize;

pub async fn run_restart(name: &str, json: bool) -> Result<()> {
    let client = DockerClient::new()?;
    let env = find_environment(&client, name).await?;

    tracing::debug!("restarting environment {name:?}");
    stop_environment(&client, &env).await?;
    start_environment(&client, &env).await?;

    print_result(name, env.containers.len(), json);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RestartResult<'a> {
    name: &'a str,
    action: &'static str,
    container_count: usize,
}

fn print_result(name: &str, container_count: usize, json: bool) {
    if json {
        let result = RestartResult {
            name,
            action: "restarted",
            container_count,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return;
    }

    println!("Restarted worktree environment {name:?} ({container_count} containers)");
}
