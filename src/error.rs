use crate::docker::DockerError;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

/// Process exit codes, as consumed by scripts and CI wrappers.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const DEVCONTAINER_NOT_FOUND: i32 = 2;
    pub const DOCKER_NOT_RUNNING: i32 = 3;
    pub const PORT_ALLOCATION_FAILED: i32 = 4;
    pub const GIT_ERROR: i32 = 5;
    pub const ENV_NOT_FOUND: i32 = 6;
    pub const USER_CANCELLED: i32 = 7;
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("devcontainer.json not found: {0}")]
    #[diagnostic(
        code(wtc::devcontainer::not_found),
        help("Add a .devcontainer/devcontainer.json (or .devcontainer.json) to the repository root")
    )]
    DevcontainerNotFound(String),

    #[error("{0}")]
    #[diagnostic(
        code(wtc::docker::error),
        help("Check that Docker is running with `docker ps`")
    )]
    Docker(#[from] DockerError),

    #[error("port allocation failed: {0}")]
    #[diagnostic(
        code(wtc::port::allocation_failed),
        help("Inspect occupied ports with `lsof -i` and stop or remove conflicting environments")
    )]
    PortAllocation(String),

    #[error("git {command} failed: {stderr}")]
    #[diagnostic(code(wtc::git::error))]
    Git { command: String, stderr: String },

    #[error("worktree environment {0:?} not found")]
    #[diagnostic(
        code(wtc::env::not_found),
        help("List known environments with `worktree-container list`")
    )]
    EnvNotFound(String),

    #[error("operation cancelled by user")]
    Cancelled,

    #[error("invalid environment name {name:?}: {reason}")]
    #[diagnostic(
        code(wtc::name::invalid),
        help("Names contain only alphanumerics and hyphens, starting and ending alphanumeric")
    )]
    InvalidName { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    #[diagnostic(code(wtc::config::validation))]
    Validation(String),

    #[error("failed to parse devcontainer.json: {0}")]
    #[diagnostic(code(wtc::config::parse))]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map the error category to the process exit code it contracts.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::DevcontainerNotFound(_) => exit_code::DEVCONTAINER_NOT_FOUND,
            Error::Docker(_) => exit_code::DOCKER_NOT_RUNNING,
            Error::PortAllocation(_) => exit_code::PORT_ALLOCATION_FAILED,
            Error::Git { .. } => exit_code::GIT_ERROR,
            Error::EnvNotFound(_) => exit_code::ENV_NOT_FOUND,
            Error::Cancelled => exit_code::USER_CANCELLED,
            _ => exit_code::GENERAL,
        }
    }

    /// Underlying cause for the `detail` field of JSON error output.
    pub fn detail(&self) -> Option<String> {
        use std::error::Error as _;
        self.source().map(|s| s.to_string())
    }

    /// Render as the `{"error": {...}}` body emitted on stderr under `--json`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut inner = serde_json::Map::new();
        inner.insert("message".into(), serde_json::Value::String(self.to_string()));
        if let Some(detail) = self.detail() {
            inner.insert("detail".into(), serde_json::Value::String(detail));
        }
        serde_json::json!({ "error": inner })
    }
}
