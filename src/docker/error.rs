use std::fmt;
use std::time::Duration;

/// Structured error for Docker CLI and daemon interactions. Wrapped into
/// the crate-level error as the docker-not-running category (exit 3).
#[derive(Debug)]
pub enum DockerError {
    /// No Docker socket found and DOCKER_HOST unset.
    SocketNotFound { probed: Vec<String> },

    /// Daemon unreachable or unresponsive within the ping deadline.
    DaemonUnavailable,

    /// A docker command exceeded its deadline.
    Timeout { command: String, timeout: Duration },

    /// A docker command ran but exited non-zero.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// The docker binary could not be spawned (not in PATH, permissions).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },
}

impl DockerError {
    pub fn timeout(command: impl Into<String>, timeout: Duration) -> Self {
        DockerError::Timeout {
            command: command.into(),
            timeout,
        }
    }

    pub fn failed(command: impl Into<String>, output: &std::process::Output) -> Self {
        DockerError::CommandFailed {
            command: command.into(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        }
    }

    pub fn exec_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        DockerError::ExecFailed {
            command: command.into(),
            source,
        }
    }
}

impl fmt::Display for DockerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerError::SocketNotFound { probed } => write!(
                f,
                "Docker socket not found at any of: {} — is Docker running?",
                probed.join(", ")
            ),
            DockerError::DaemonUnavailable => {
                write!(f, "Docker daemon is not responding — is Docker running?")
            }
            DockerError::Timeout { command, timeout } => write!(
                f,
                "'{command}' timed out after {} seconds",
                timeout.as_secs()
            ),
            DockerError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => match exit_code {
                Some(code) => write!(f, "'{command}' failed (exit code {code}): {stderr}"),
                None => write!(f, "'{command}' failed: {stderr}"),
            },
            DockerError::ExecFailed { command, source } => {
                write!(f, "failed to execute '{command}': {source}")
            }
        }
    }
}

impl std::error::Error for DockerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DockerError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
