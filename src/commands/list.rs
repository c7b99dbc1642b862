//! The `list` command: discover and display managed environments.

use crate::docker::{self, DockerClient};
use crate::error::{Error, Result};
use crate::model::{WorktreeEnv, WorktreeStatus};
use crate::output;
use serde::Serialize;

pub async fn run_list(status: &str, json: bool) -> Result<()> {
    // Validate the filter before touching Docker so a typo fails fast.
    let filter: Option<WorktreeStatus> = if status == "all" {
        None
    } else {
        Some(status.parse().map_err(|_| {
            Error::Validation(format!(
                "invalid status filter {status:?}: valid values are running, stopped, orphaned, all"
            ))
        })?)
    };

    let client = DockerClient::new()?;
    let containers = client.list_managed().await?;
    tracing::debug!("found {} managed containers", containers.len());

    let groups = docker::group_by_env(containers);

    let mut envs: Vec<WorktreeEnv> = Vec::with_capacity(groups.len());
    for (name, group) in groups {
        match docker::build_env(&name, group) {
            Ok(env) => envs.push(env),
            // One corrupted environment must not hide the others.
            Err(e) => tracing::warn!("skipping environment {name:?}: {e}"),
        }
    }

    envs.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(wanted) = filter {
        envs.retain(|env| env.status == wanted);
    }

    print_result(&envs, json);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListService<'a> {
    name: &'a str,
    container_port: u16,
    host_port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEnv<'a> {
    name: &'a str,
    branch: &'a str,
    status: String,
    worktree_path: String,
    config_pattern: String,
    created_at: String,
    services: Vec<ListService<'a>>,
}

#[derive(Serialize)]
struct ListResult<'a> {
    environments: Vec<ListEnv<'a>>,
}

fn print_result(envs: &[WorktreeEnv], json: bool) {
    if json {
        let result = ListResult {
            environments: envs
                .iter()
                .map(|env| ListEnv {
                    name: &env.name,
                    branch: &env.branch,
                    status: env.status.to_string(),
                    worktree_path: env.worktree_path.display().to_string(),
                    config_pattern: env.config_pattern.to_string(),
                    created_at: env.created_at.to_rfc3339(),
                    services: env
                        .port_allocations
                        .iter()
                        .map(|a| ListService {
                            name: &a.service_name,
                            container_port: a.container_port,
                            host_port: a.host_port,
                        })
                        .collect(),
                })
                .collect(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return;
    }

    output::print_env_table(envs);
}
