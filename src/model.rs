//! Domain types for worktree environments.
//!
//! Everything here is a transient representation: all persistent state lives
//! in Docker container labels and is reconstructed at runtime (see
//! [`crate::docker::label`]). There is no state file on disk.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

/// Lifecycle state of a worktree environment. Derived from observed
/// container state and worktree-directory existence, never persisted.
///
/// Transitions: created → running ⇄ stopped → removed, with
/// running/stopped → orphaned when the worktree directory disappears
/// out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorktreeStatus {
    Running,
    Stopped,
    Orphaned,
}

impl fmt::Display for WorktreeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorktreeStatus::Running => "running",
            WorktreeStatus::Stopped => "stopped",
            WorktreeStatus::Orphaned => "orphaned",
        };
        f.write_str(s)
    }
}

impl FromStr for WorktreeStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "running" => Ok(WorktreeStatus::Running),
            "stopped" => Ok(WorktreeStatus::Stopped),
            "orphaned" => Ok(WorktreeStatus::Orphaned),
            other => Err(Error::Validation(format!(
                "invalid status {other:?} (valid: running, stopped, orphaned)"
            ))),
        }
    }
}

/// Shape of the source devcontainer configuration, by primary image source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigPattern {
    /// Pre-built image reference (`"image": "node:20"`).
    Image,
    /// Built from a Dockerfile (`"build": {...}`).
    Dockerfile,
    /// `dockerComposeFile` with a single service.
    ComposeSingle,
    /// `dockerComposeFile` with two or more services.
    ComposeMulti,
}

impl ConfigPattern {
    pub fn is_compose(self) -> bool {
        matches!(self, ConfigPattern::ComposeSingle | ConfigPattern::ComposeMulti)
    }
}

impl fmt::Display for ConfigPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigPattern::Image => "image",
            ConfigPattern::Dockerfile => "dockerfile",
            ConfigPattern::ComposeSingle => "compose-single",
            ConfigPattern::ComposeMulti => "compose-multi",
        };
        f.write_str(s)
    }
}

impl FromStr for ConfigPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(ConfigPattern::Image),
            "dockerfile" => Ok(ConfigPattern::Dockerfile),
            "compose-single" => Ok(ConfigPattern::ComposeSingle),
            "compose-multi" => Ok(ConfigPattern::ComposeMulti),
            other => Err(Error::Validation(format!(
                "invalid config pattern {other:?} (valid: image, dockerfile, compose-single, compose-multi)"
            ))),
        }
    }
}

/// Network protocol of a port mapping. Docker defaults to TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        })
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            // Empty means "unspecified in the source config" and follows
            // Docker's default.
            "" | "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(Error::Validation(format!(
                "invalid protocol {other:?} (valid: tcp, udp)"
            ))),
        }
    }
}

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?$").expect("static regex")
});

/// Validate a worktree environment name: alphanumerics and hyphens only,
/// starting and ending with an alphanumeric character.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if !NAME_REGEX.is_match(name) {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "must contain only alphanumerics and hyphens, starting and ending alphanumeric"
                .to_string(),
        });
    }
    Ok(())
}

/// A port requirement extracted from devcontainer.json, normalized across
/// the `forwardPorts` / `appPort` / `portsAttributes` source formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// Owning container or Compose service. Defaults to the primary service.
    pub service_name: String,
    /// Port inside the container (1-65535).
    pub container_port: u16,
    /// Host port requested by the source config; 0 when unspecified
    /// (`forwardPorts` entries only name container ports).
    pub host_port: u16,
    pub protocol: Protocol,
    /// Human description sourced from `portsAttributes`.
    pub label: Option<String>,
}

impl PortSpec {
    pub fn new(service_name: impl Into<String>, container_port: u16) -> Self {
        PortSpec {
            service_name: service_name.into(),
            container_port,
            host_port: 0,
            protocol: Protocol::Tcp,
            label: None,
        }
    }
}

/// A fully assigned host↔container port mapping produced by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortAllocation {
    pub service_name: String,
    pub container_port: u16,
    /// Assigned host port, always in [1024, 65535] and unique per protocol
    /// within the environment and across all known environments.
    pub host_port: u16,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PortAllocation {
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(Error::Validation(
                "port allocation: service name must not be empty".to_string(),
            ));
        }
        if self.container_port == 0 {
            return Err(Error::Validation(
                "port allocation: container port must be in 1-65535".to_string(),
            ));
        }
        if self.host_port < 1024 {
            return Err(Error::Validation(format!(
                "port allocation: host port {} out of range (1024-65535)",
                self.host_port
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PortAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}/{}",
            self.service_name, self.container_port, self.host_port, self.protocol
        )
    }
}

/// Check a set of allocations for individual validity and host-port
/// uniqueness per protocol. The same host port on tcp and udp is allowed.
pub fn validate_port_allocations(allocations: &[PortAllocation]) -> Result<()> {
    let mut seen: HashMap<(u16, Protocol), &str> = HashMap::new();

    for alloc in allocations {
        alloc.validate()?;

        let key = (alloc.host_port, alloc.protocol);
        if let Some(owner) = seen.get(&key) {
            return Err(Error::Validation(format!(
                "port allocation: host port {}/{} is used by both {:?} and {:?}",
                alloc.host_port, alloc.protocol, owner, alloc.service_name
            )));
        }
        seen.insert(key, &alloc.service_name);
    }
    Ok(())
}

/// Runtime data about one Docker container, as reported by the daemon.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub container_id: String,
    pub container_name: String,
    /// Compose service name (`com.docker.compose.service` label); empty for
    /// pattern A/B containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Daemon status string ("running", "exited", "created", ...).
    pub status: String,
    #[serde(skip_serializing)]
    pub labels: HashMap<String, String>,
}

/// A worktree environment: a Git worktree paired with its Dev Container
/// setup. The primary aggregate, reconstructed from container labels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeEnv {
    pub name: String,
    pub branch: String,
    pub worktree_path: PathBuf,
    pub source_repo_path: PathBuf,
    pub status: WorktreeStatus,
    pub config_pattern: ConfigPattern,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_allocations: Vec<PortAllocation>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(service: &str, container: u16, host: u16, protocol: Protocol) -> PortAllocation {
        PortAllocation {
            service_name: service.to_string(),
            container_port: container,
            host_port: host,
            protocol,
            label: None,
        }
    }

    #[test]
    fn status_round_trips() {
        for s in [
            WorktreeStatus::Running,
            WorktreeStatus::Stopped,
            WorktreeStatus::Orphaned,
        ] {
            assert_eq!(s.to_string().parse::<WorktreeStatus>().unwrap(), s);
        }
        assert!("exploded".parse::<WorktreeStatus>().is_err());
    }

    #[test]
    fn pattern_round_trips() {
        for p in [
            ConfigPattern::Image,
            ConfigPattern::Dockerfile,
            ConfigPattern::ComposeSingle,
            ConfigPattern::ComposeMulti,
        ] {
            assert_eq!(p.to_string().parse::<ConfigPattern>().unwrap(), p);
        }
        assert!(ConfigPattern::ComposeSingle.is_compose());
        assert!(ConfigPattern::ComposeMulti.is_compose());
        assert!(!ConfigPattern::Image.is_compose());
        assert!(!ConfigPattern::Dockerfile.is_compose());
    }

    #[test]
    fn protocol_defaults_to_tcp() {
        assert_eq!("".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert!("sctp".parse::<Protocol>().is_err());
    }

    #[test]
    fn valid_names() {
        for name in ["a", "feature-auth", "x1", "A-2-b", "worktree"] {
            validate_name(name).unwrap();
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "-leading", "trailing-", "has space", "under_score", "dot.name"] {
            assert!(validate_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn allocation_validation_ranges() {
        assert!(alloc("app", 3000, 13000, Protocol::Tcp).validate().is_ok());
        assert!(alloc("app", 3000, 80, Protocol::Tcp).validate().is_err());
        assert!(alloc("", 3000, 13000, Protocol::Tcp).validate().is_err());
        assert!(alloc("app", 0, 13000, Protocol::Tcp).validate().is_err());
    }

    #[test]
    fn duplicate_host_port_same_protocol_rejected() {
        let allocs = vec![
            alloc("app", 3000, 13000, Protocol::Tcp),
            alloc("db", 5432, 13000, Protocol::Tcp),
        ];
        assert!(validate_port_allocations(&allocs).is_err());
    }

    #[test]
    fn duplicate_host_port_differing_protocol_allowed() {
        let allocs = vec![
            alloc("app", 3000, 13000, Protocol::Tcp),
            alloc("dns", 5353, 13000, Protocol::Udp),
        ];
        validate_port_allocations(&allocs).unwrap();
    }
}
