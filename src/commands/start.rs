//! The `start` command: bring a stopped environment back up.
//!
//! Every allocated host port is re-verified against the OS before any
//! container starts. Launching with a silently broken port mapping is
//! worse than failing loudly with the conflicting port list.

use super::{compose_files_for, devcontainer_dir, find_environment};
use crate::docker::DockerClient;
use crate::error::{Error, Result};
use crate::model::WorktreeEnv;
use crate::output;
use crate::port::PortScanner;
use serde::Serialize;

pub async fn run_start(name: &str, json: bool) -> Result<()> {
    let client = DockerClient::new()?;
    let env = find_environment(&client, name).await?;
    tracing::debug!(
        "found environment {name:?} with {} containers",
        env.containers.len()
    );

    start_environment(&client, &env).await?;

    print_result(&env, json);
    Ok(())
}

/// Port pre-check plus pattern-specific startup. Shared with `restart`.
pub(crate) async fn start_environment(client: &DockerClient, env: &WorktreeEnv) -> Result<()> {
    let scanner = PortScanner::new();
    let conflicts: Vec<u16> = env
        .port_allocations
        .iter()
        .filter(|a| !scanner.is_available(a.host_port, a.protocol))
        .map(|a| a.host_port)
        .collect();
    if !conflicts.is_empty() {
        return Err(Error::PortAllocation(format!(
            "the following ports are already in use: {conflicts:?}"
        )));
    }

    if env.config_pattern.is_compose() {
        let files = compose_files_for(env)?;
        tracing::debug!("docker compose up for {:?} with files {files:?}", env.name);
        client
            .compose_up(&devcontainer_dir(env), &files, &env.name)
            .await?;
    } else {
        for container in &env.containers {
            tracing::debug!("starting container {}", container.container_name);
            client.start_container(&container.container_id).await?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartService<'a> {
    name: &'a str,
    container_port: u16,
    host_port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResult<'a> {
    name: &'a str,
    action: &'static str,
    services: Vec<StartService<'a>>,
}

fn print_result(env: &WorktreeEnv, json: bool) {
    if json {
        let result = StartResult {
            name: &env.name,
            action: "started",
            services: env
                .port_allocations
                .iter()
                .map(|a| StartService {
                    name: &a.service_name,
                    container_port: a.container_port,
                    host_port: a.host_port,
                })
                .collect(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return;
    }

    println!("Started worktree environment {:?}", env.name);
    output::print_services(env);
}
