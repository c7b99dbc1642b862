//! The `create` command: pair a new Git worktree with an isolated Dev
//! Container environment.

use crate::devcontainer::{self, OVERRIDE_FILE_NAME};
use crate::docker::{self, label, DockerClient};
use crate::error::{Error, Result};
use crate::model::{
    validate_name, validate_port_allocations, ConfigPattern, PortAllocation, WorktreeEnv,
    WorktreeStatus,
};
use crate::output;
use crate::port::{PortAllocator, PortScanner, MAX_INDEX};
use crate::worktree;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct CreateOptions {
    pub branch: String,
    pub base: Option<String>,
    pub path: Option<PathBuf>,
    pub name: Option<String>,
    pub no_start: bool,
    pub json: bool,
}

pub async fn run_create(opts: CreateOptions) -> Result<()> {
    // Locate the source repository from the current working directory.
    let cwd = std::env::current_dir()?;
    let repo_root = worktree::repo_root(&cwd).await.map_err(|_| Error::Git {
        command: "rev-parse --show-toplevel".to_string(),
        stderr: "not inside a Git repository".to_string(),
    })?;
    tracing::debug!("source repository: {}", repo_root.display());

    // Resolve the environment name and validate it.
    let env_name = match &opts.name {
        Some(name) => name.clone(),
        None => sanitize_branch_name(&opts.branch),
    };
    validate_name(&env_name)?;
    tracing::debug!("environment name: {env_name}");

    // Resolve the worktree path: flag, or a sibling of the source repo.
    let worktree_path = match &opts.path {
        Some(path) => path.clone(),
        None => {
            let repo_name = repo_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "repo".to_string());
            repo_root
                .parent()
                .unwrap_or(&repo_root)
                .join(format!("{repo_name}-{env_name}"))
        }
    };
    let worktree_path = std::path::absolute(&worktree_path)?;
    tracing::debug!("worktree path: {}", worktree_path.display());

    // Discover existing environments once: duplicate-name rejection, the
    // worktree index, and the known allocation set all come from this
    // snapshot. A missing daemon degrades to index 1 with no known
    // allocations so `create --no-start` works without Docker.
    let (env_count, known_allocations, duplicate) =
        discover_existing(&env_name).await.unwrap_or_else(|e| {
            tracing::warn!("cannot query Docker for existing environments: {e}");
            (0, Vec::new(), false)
        });
    if duplicate {
        return Err(Error::Validation(format!(
            "environment {env_name:?} already exists; remove it first or pick another --name"
        )));
    }

    let worktree_index = env_count + 1;
    if worktree_index > usize::from(MAX_INDEX) {
        return Err(Error::PortAllocation(format!(
            "maximum of 10 concurrent environments reached (currently {env_count})"
        )));
    }
    let worktree_index = worktree_index as u8;
    tracing::debug!("worktree index: {worktree_index}");

    // Create the Git worktree.
    worktree::add(
        &repo_root,
        &opts.branch,
        &worktree_path,
        opts.base.as_deref(),
    )
    .await?;
    tracing::info!(
        "created worktree for branch {:?} at {}",
        opts.branch,
        worktree_path.display()
    );

    // Find and parse the source configuration. The source repo is
    // authoritative; the worktree checkout may predate config changes.
    let config_path = devcontainer::find_config(&repo_root)?;
    let raw_json = std::fs::read_to_string(&config_path)?;
    let config = devcontainer::parse_config(&raw_json)?;
    let source_config_dir = config_path
        .parent()
        .unwrap_or(&repo_root)
        .to_path_buf();

    // Classify the configuration, counting Compose services when needed.
    let compose_files = config.compose_files();
    let service_count = if compose_files.is_empty() {
        0
    } else {
        devcontainer::count_compose_services(&source_config_dir, &config)
    };
    let pattern = devcontainer::detect_pattern(&config, service_count);
    tracing::debug!("detected pattern: {pattern}");

    // Extract port requirements and allocate shifted host ports.
    let default_service = config.default_service(&env_name);
    let specs = devcontainer::extract_ports(&config, &default_service);
    tracing::debug!("found {} port(s) to allocate", specs.len());

    let mut allocator = PortAllocator::new(PortScanner::new());
    allocator.set_known_allocations(known_allocations);
    let allocations = allocator.allocate_ports(&specs, worktree_index)?;
    validate_port_allocations(&allocations)?;
    for alloc in &allocations {
        tracing::debug!("port allocated: {alloc}");
    }

    // The intended environment, from which the label set derives.
    let mut env = WorktreeEnv {
        name: env_name.clone(),
        branch: opts.branch.clone(),
        worktree_path: worktree_path.clone(),
        source_repo_path: repo_root.clone(),
        status: WorktreeStatus::Stopped,
        config_pattern: pattern,
        containers: Vec::new(),
        port_allocations: allocations,
        created_at: Utc::now(),
    };
    let labels = label::build_labels(&env);

    // Materialize the derived configuration inside the worktree.
    let uses_devcontainer_dir = source_config_dir.ends_with(".devcontainer");
    let (dst_config_dir, dst_config_path) = if uses_devcontainer_dir {
        let dir = worktree_path.join(".devcontainer");
        devcontainer::copy_devcontainer_dir(&source_config_dir, &dir)?;
        let path = dir.join("devcontainer.json");
        (dir, path)
    } else {
        // Root-level .devcontainer.json: nothing to copy, the rewritten
        // file lands at the worktree root.
        (worktree_path.clone(), worktree_path.join(".devcontainer.json"))
    };

    if pattern.is_compose() {
        let services = devcontainer::all_services(&source_config_dir, &config);
        let override_yaml = devcontainer::generate_override(
            &env_name,
            &services,
            &env.port_allocations,
            &labels,
        )?;
        devcontainer::write_config(&dst_config_dir.join(OVERRIDE_FILE_NAME), &override_yaml)?;

        let rewritten =
            devcontainer::rewrite_compose_config(&raw_json, &env_name, OVERRIDE_FILE_NAME)?;
        devcontainer::write_config(&dst_config_path, &rewritten)?;
    } else {
        let rewritten = devcontainer::rewrite_config(
            &raw_json,
            &env_name,
            worktree_index,
            &env.port_allocations,
            &labels,
        )?;
        devcontainer::write_config(&dst_config_path, &rewritten)?;
    }
    tracing::info!("derived configuration written to {}", dst_config_path.display());

    // The derived configuration must be complete from the worktree's
    // point of view before anything launches.
    if uses_devcontainer_dir {
        let issues = devcontainer::validate_worktree_config(&dst_config_dir)?;
        if !issues.is_empty() {
            return Err(Error::Validation(format!(
                "derived configuration is incomplete: {}",
                issues.join("; ")
            )));
        }
    }

    // Launch, unless asked not to.
    if opts.no_start {
        tracing::debug!("skipping container startup (--no-start)");
    } else {
        launch(
            &env,
            &config,
            &compose_files,
            &dst_config_dir,
            &labels,
            worktree_index,
        )
        .await?;
        env.status = WorktreeStatus::Running;
    }

    print_result(&env, opts.json);
    Ok(())
}

/// One Docker snapshot answering three questions: how many environments
/// exist, which host ports they hold, and whether the name is taken.
async fn discover_existing(
    env_name: &str,
) -> Result<(usize, Vec<PortAllocation>, bool)> {
    let client = DockerClient::new()?;
    let containers = client.list_managed().await?;

    let mut allocations = Vec::new();
    for container in &containers {
        match label::parse_port_labels(&container.labels) {
            Ok(ports) => allocations.extend(ports),
            Err(e) => tracing::warn!(
                "skipping port labels of container {}: {e}",
                container.container_name
            ),
        }
    }

    let groups = docker::group_by_env(containers);
    let duplicate = groups.contains_key(env_name);
    Ok((groups.len(), allocations, duplicate))
}

/// Launch the environment's containers according to its pattern.
async fn launch(
    env: &WorktreeEnv,
    config: &devcontainer::RawConfig,
    compose_files: &[String],
    config_dir: &Path,
    labels: &BTreeMap<String, String>,
    worktree_index: u8,
) -> Result<()> {
    let client = DockerClient::new()?;
    client.ping().await?;

    if env.config_pattern.is_compose() {
        let mut files = compose_files.to_vec();
        files.push(OVERRIDE_FILE_NAME.to_string());
        tracing::debug!("docker compose up with files: {files:?}");
        client.compose_up(config_dir, &files, &env.name).await?;
        return Ok(());
    }

    // Image / dockerfile patterns: a single container via `docker run -d`.
    let image = match env.config_pattern {
        ConfigPattern::Dockerfile => {
            let build = config.build.as_ref().ok_or_else(|| {
                Error::Validation("dockerfile pattern requires a build section".to_string())
            })?;
            let dockerfile = config_dir.join(build.dockerfile.as_deref().unwrap_or("Dockerfile"));
            let context = match build.context.as_deref() {
                Some(ctx) => config_dir.join(ctx),
                None => config_dir.to_path_buf(),
            };
            let tag = format!("worktree-container/{}", env.name.to_lowercase());
            tracing::info!("building image {tag}");
            client.build_image(&tag, &dockerfile, &context).await?;
            tag
        }
        _ => config.image.clone().ok_or_else(|| {
            Error::Validation("image pattern requires an image field".to_string())
        })?,
    };

    let args = build_run_args(env, config, labels, worktree_index, &image);
    tracing::debug!("docker run {}", args.join(" "));
    let container_id = client.run_detached(&args).await?;
    tracing::info!("started container {container_id}");
    Ok(())
}

/// Assemble the `docker run` argument list: name, labels, shifted port
/// publications, worktree env vars, the worktree mounted at the workspace
/// folder, the user's original runArgs, then the image and a keep-alive
/// command so entrypoint-less images don't exit immediately.
fn build_run_args(
    env: &WorktreeEnv,
    config: &devcontainer::RawConfig,
    labels: &BTreeMap<String, String>,
    worktree_index: u8,
    image: &str,
) -> Vec<String> {
    let workspace = config
        .workspace_folder
        .clone()
        .unwrap_or_else(|| format!("/workspaces/{}", env.name));

    let mut args = vec!["--name".to_string(), env.name.clone()];

    for (key, value) in labels {
        args.push("--label".to_string());
        args.push(format!("{key}={value}"));
    }

    for alloc in &env.port_allocations {
        args.push("-p".to_string());
        args.push(match alloc.protocol {
            crate::model::Protocol::Tcp => format!("{}:{}", alloc.host_port, alloc.container_port),
            crate::model::Protocol::Udp => {
                format!("{}:{}/udp", alloc.host_port, alloc.container_port)
            }
        });
    }

    args.push("-e".to_string());
    args.push(format!("WORKTREE_NAME={}", env.name));
    args.push("-e".to_string());
    args.push(format!("WORKTREE_INDEX={worktree_index}"));

    args.push("-v".to_string());
    args.push(format!("{}:{workspace}", env.worktree_path.display()));
    args.push("-w".to_string());
    args.push(workspace);

    args.extend(config.run_args.iter().cloned());

    args.push(image.to_string());
    args.push("sleep".to_string());
    args.push("infinity".to_string());

    args
}

/// Convert a Git branch name into a valid environment name: separators
/// become hyphens, everything else non-alphanumeric is dropped.
fn sanitize_branch_name(branch: &str) -> String {
    let name: String = branch
        .chars()
        .map(|c| if c == '/' || c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let name = name.trim_matches('-').to_string();
    if name.is_empty() {
        "worktree".to_string()
    } else {
        name
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResult<'a> {
    name: &'a str,
    container_port: u16,
    host_port: u16,
    protocol: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateResult<'a> {
    name: &'a str,
    branch: &'a str,
    worktree_path: String,
    status: String,
    config_pattern: String,
    services: Vec<ServiceResult<'a>>,
}

fn print_result(env: &WorktreeEnv, json: bool) {
    if json {
        let result = CreateResult {
            name: &env.name,
            branch: &env.branch,
            worktree_path: env.worktree_path.display().to_string(),
            status: env.status.to_string(),
            config_pattern: env.config_pattern.to_string(),
            services: env
                .port_allocations
                .iter()
                .map(|a| ServiceResult {
                    name: &a.service_name,
                    container_port: a.container_port,
                    host_port: a.host_port,
                    protocol: a.protocol.to_string(),
                })
                .collect(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return;
    }

    let mut pattern = env.config_pattern.to_string();
    if !env.port_allocations.is_empty() {
        pattern = format!("{pattern} ({} services)", env.port_allocations.len());
    }

    println!("Created worktree environment {:?}", env.name);
    println!("  Branch:    {}", env.branch);
    println!("  Path:      {}", env.worktree_path.display());
    println!("  Pattern:   {pattern}");
    output::print_services(env);
}
