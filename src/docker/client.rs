//! Docker CLI client.
//!
//! All Docker interaction goes through [`DockerClient`]: a thin wrapper
//! around `docker` subprocess invocations with consistent timeout handling
//! and structured [`DockerError`] returns. Shelling the CLI keeps container
//! creation at the same abstraction level users debug with (`docker run`,
//! `docker compose up`) instead of hand-building API container specs.

use super::error::DockerError;
use super::label;
use crate::model::ContainerInfo;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

/// Deadline for the daemon reachability probe.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for ordinary container commands (start/stop/rm/inspect).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for compose verbs and `docker run`, which may pull images.
pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(600);

/// Compose label carrying the service name a container belongs to.
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

#[derive(Debug, Clone)]
pub struct DockerClient {
    /// Connection string exported as DOCKER_HOST to every child process.
    host: String,
}

/// Determine the Docker daemon address.
///
/// `DOCKER_HOST` is honored unconditionally when set. Otherwise the
/// platform default socket paths are probed: the standard Unix socket, the
/// user-home socket used by newer Docker Desktop builds on macOS, and the
/// named pipe on Windows.
pub fn detect_docker_host() -> Result<String, DockerError> {
    if let Ok(host) = std::env::var("DOCKER_HOST") {
        if !host.is_empty() {
            return Ok(host);
        }
    }

    if cfg!(windows) {
        return Ok("npipe:////./pipe/docker_engine".to_string());
    }

    let mut candidates = vec![std::path::PathBuf::from("/var/run/docker.sock")];
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".docker/run/docker.sock"));
        }
    }

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(format!("unix://{}", candidate.display()));
        }
    }

    Err(DockerError::SocketNotFound {
        probed: candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    })
}

/// `docker inspect` record, reduced to the fields this crate consumes.
#[derive(Debug, Deserialize)]
struct InspectRecord {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: InspectState,
    #[serde(rename = "Config")]
    config: InspectConfig,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

impl DockerClient {
    /// Create a client, failing with the docker-not-running category when
    /// no daemon address can be determined.
    pub fn new() -> Result<Self, DockerError> {
        Ok(DockerClient {
            host: detect_docker_host()?,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run a docker command under a deadline, returning the raw output.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, DockerError> {
        let cmd_str = format!("docker {}", args.join(" "));

        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker")
                .args(args)
                .env("DOCKER_HOST", &self.host)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DockerError::exec_failed(cmd_str, e)),
            Err(_) => Err(DockerError::timeout(cmd_str, timeout)),
        }
    }

    /// Run a docker command, requiring exit 0.
    async fn run_success(&self, args: &[&str], timeout: Duration) -> Result<Output, DockerError> {
        let output = self.run(args, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(DockerError::failed(
                format!("docker {}", args.join(" ")),
                &output,
            ))
        }
    }

    /// Verify the daemon is reachable and responsive within ~5 s.
    pub async fn ping(&self) -> Result<(), DockerError> {
        match self
            .run(
                &["version", "--format", "{{.Server.Version}}"],
                PING_TIMEOUT,
            )
            .await
        {
            Ok(output) if output.status.success() => Ok(()),
            _ => Err(DockerError::DaemonUnavailable),
        }
    }

    // ── Managed-container discovery ─────────────────────────────────────

    /// List every container (including stopped ones) carrying the
    /// managed-by label, mapped into [`ContainerInfo`].
    pub async fn list_managed(&self) -> Result<Vec<ContainerInfo>, DockerError> {
        let (key, value) = label::filter_label();
        let filter = format!("label={key}={value}");
        let output = self
            .run_success(
                &["ps", "-aq", "--no-trunc", "--filter", &filter],
                DEFAULT_TIMEOUT,
            )
            .await?;

        let ids: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["inspect"];
        args.extend(ids.iter().map(String::as_str));
        let output = self.run_success(&args, DEFAULT_TIMEOUT).await?;

        let records: Vec<InspectRecord> = serde_json::from_slice(&output.stdout)
            .map_err(|e| DockerError::CommandFailed {
                command: "docker inspect".to_string(),
                stderr: format!("unparseable inspect output: {e}"),
                exit_code: None,
            })?;

        Ok(records.into_iter().map(record_to_info).collect())
    }

    // ── Per-container lifecycle (image / dockerfile patterns) ───────────

    pub async fn start_container(&self, container_id: &str) -> Result<(), DockerError> {
        self.run_success(&["start", container_id], DEFAULT_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Stop with the daemon's default grace period (SIGTERM, then SIGKILL).
    pub async fn stop_container(&self, container_id: &str) -> Result<(), DockerError> {
        self.run_success(&["stop", container_id], DEFAULT_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn remove_container(
        &self,
        container_id: &str,
        force: bool,
    ) -> Result<(), DockerError> {
        let args: &[&str] = if force {
            &["rm", "-f", container_id]
        } else {
            &["rm", container_id]
        };
        let output = self.run(args, DEFAULT_TIMEOUT).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Already gone is the desired end state.
        if stderr.contains("No such container") {
            return Ok(());
        }
        Err(DockerError::failed("docker rm", &output))
    }

    /// `docker run -d` with a caller-supplied argument list. Returns the
    /// new container ID.
    pub async fn run_detached(&self, run_args: &[String]) -> Result<String, DockerError> {
        let mut args = vec!["run", "-d"];
        args.extend(run_args.iter().map(String::as_str));
        let output = self.run_success(&args, LAUNCH_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `docker build` for the dockerfile pattern. Inherits stdio so build
    /// progress streams to the terminal; no deadline, builds are unbounded.
    pub async fn build_image(
        &self,
        tag: &str,
        dockerfile: &Path,
        context: &Path,
    ) -> Result<(), DockerError> {
        let cmd_str = format!(
            "docker build -t {tag} -f {} {}",
            dockerfile.display(),
            context.display()
        );
        let status = tokio::process::Command::new("docker")
            .arg("build")
            .arg("-t")
            .arg(tag)
            .arg("-f")
            .arg(dockerfile)
            .arg(context)
            .env("DOCKER_HOST", &self.host)
            .stdin(std::process::Stdio::inherit())
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit())
            .status()
            .await
            .map_err(|e| DockerError::exec_failed(&cmd_str, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(DockerError::CommandFailed {
                command: cmd_str,
                stderr: "build failed".to_string(),
                exit_code: status.code(),
            })
        }
    }

    // ── Compose (compose-single / compose-multi patterns) ───────────────

    /// Run a `docker compose` verb with an ordered `-f` list, the worktree's
    /// `.devcontainer/` as working directory, and COMPOSE_PROJECT_NAME
    /// exported so container, network, and volume names are namespaced per
    /// environment.
    async fn compose(
        &self,
        project_dir: &Path,
        compose_files: &[String],
        project_name: &str,
        verb: &[&str],
        timeout: Duration,
    ) -> Result<(), DockerError> {
        let mut args: Vec<&str> = vec!["compose"];
        for file in compose_files {
            args.push("-f");
            args.push(file);
        }
        args.extend_from_slice(verb);

        let cmd_str = format!("docker {}", args.join(" "));

        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker")
                .args(&args)
                .current_dir(project_dir)
                .env("DOCKER_HOST", &self.host)
                .env("COMPOSE_PROJECT_NAME", project_name)
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(DockerError::exec_failed(cmd_str, e)),
            Err(_) => return Err(DockerError::timeout(cmd_str, timeout)),
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(DockerError::failed(cmd_str, &output))
        }
    }

    pub async fn compose_up(
        &self,
        project_dir: &Path,
        compose_files: &[String],
        project_name: &str,
    ) -> Result<(), DockerError> {
        self.compose(
            project_dir,
            compose_files,
            project_name,
            &["up", "-d"],
            LAUNCH_TIMEOUT,
        )
        .await
    }

    pub async fn compose_stop(
        &self,
        project_dir: &Path,
        compose_files: &[String],
        project_name: &str,
    ) -> Result<(), DockerError> {
        self.compose(
            project_dir,
            compose_files,
            project_name,
            &["stop"],
            DEFAULT_TIMEOUT,
        )
        .await
    }

    /// `docker compose down`, optionally removing named volumes for a
    /// complete teardown.
    pub async fn compose_down(
        &self,
        project_dir: &Path,
        compose_files: &[String],
        project_name: &str,
        remove_volumes: bool,
    ) -> Result<(), DockerError> {
        let verb: &[&str] = if remove_volumes {
            &["down", "-v"]
        } else {
            &["down"]
        };
        self.compose(project_dir, compose_files, project_name, verb, LAUNCH_TIMEOUT)
            .await
    }
}

/// Pure mapping from a daemon inspect record to the domain type. The
/// daemon reports names with a leading `/`, an API artifact stripped here.
fn record_to_info(record: InspectRecord) -> ContainerInfo {
    let labels = record.config.labels.unwrap_or_default();
    let service_name = labels
        .get(COMPOSE_SERVICE_LABEL)
        .filter(|s| !s.is_empty())
        .cloned();

    ContainerInfo {
        container_id: record.id,
        container_name: record.name.trim_start_matches('/').to_string(),
        service_name,
        status: record.state.status,
        labels,
    }
}
