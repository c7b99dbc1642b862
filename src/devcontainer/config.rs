//! Loading and analysis of devcontainer.json files.
//!
//! The typed [`RawConfig`] view captures only the fields needed for pattern
//! detection and port extraction. Rewriting works on a generic map instead
//! (see [`super::rewrite`]) so unknown fields survive the transformation.

use super::jsonc;
use crate::error::{Error, Result};
use crate::model::{ConfigPattern, PortSpec, Protocol};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Typed view of devcontainer.json. Fields that the devcontainer spec
/// allows in several shapes (string-or-array, int-or-string) deserialize
/// as [`serde_json::Value`] and are normalized by accessors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    pub name: Option<String>,
    pub image: Option<String>,
    pub build: Option<BuildConfig>,
    /// String or array of strings.
    pub docker_compose_file: Option<serde_json::Value>,
    /// Primary Compose service the dev container attaches to.
    pub service: Option<String>,
    /// Compose services to start; when omitted, all services run.
    pub run_services: Vec<String>,
    pub workspace_folder: Option<String>,
    /// Entries are integers (container port) or `"service:port"` strings.
    pub forward_ports: Vec<serde_json::Value>,
    /// Integer, `"host:container"` string, or an array of those.
    pub app_port: Option<serde_json::Value>,
    /// Metadata keyed by port number as a string. Not a port source.
    pub ports_attributes: HashMap<String, PortAttribute>,
    pub container_env: HashMap<String, String>,
    pub run_args: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    pub dockerfile: Option<String>,
    pub context: Option<String>,
    pub args: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortAttribute {
    pub label: Option<String>,
    pub on_auto_forward: Option<String>,
}

/// Locate devcontainer.json under a project root, in spec search order:
/// `.devcontainer/devcontainer.json` first, then `.devcontainer.json`.
pub fn find_config(project: &Path) -> Result<PathBuf> {
    let candidates = [
        project.join(".devcontainer").join("devcontainer.json"),
        project.join(".devcontainer.json"),
    ];
    for candidate in &candidates {
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }
    Err(Error::DevcontainerNotFound(format!(
        "{} (searched .devcontainer/devcontainer.json and .devcontainer.json)",
        project.display()
    )))
}

/// Read and parse a devcontainer.json, stripping JSONC comments first.
pub fn load_config(path: &Path) -> Result<RawConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::DevcontainerNotFound(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;
    parse_config(&raw)
}

/// Parse raw JSONC bytes into the typed view.
pub fn parse_config(raw: &str) -> Result<RawConfig> {
    let clean = jsonc::strip(raw);
    Ok(serde_json::from_str(&clean)?)
}

impl RawConfig {
    /// Normalize `dockerComposeFile` into a list of paths. Empty when the
    /// field is absent.
    pub fn compose_files(&self) -> Vec<String> {
        match &self.docker_compose_file {
            None => Vec::new(),
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(_) => Vec::new(),
        }
    }

    /// The service name used for ports that don't name one.
    pub fn default_service(&self, fallback: &str) -> String {
        self.service.clone().unwrap_or_else(|| fallback.to_string())
    }
}

/// Classify the configuration. `compose_service_count` comes from
/// [`count_compose_services`] and only matters when `dockerComposeFile`
/// is present; Compose takes precedence over `build` and `image`.
pub fn detect_pattern(raw: &RawConfig, compose_service_count: usize) -> ConfigPattern {
    if raw.docker_compose_file.is_some() {
        if compose_service_count >= 2 {
            return ConfigPattern::ComposeMulti;
        }
        return ConfigPattern::ComposeSingle;
    }
    if raw.build.is_some() {
        return ConfigPattern::Dockerfile;
    }
    ConfigPattern::Image
}

#[derive(Debug, Deserialize)]
struct ComposeDoc {
    #[serde(default)]
    services: HashMap<String, serde_yaml::Value>,
}

/// Count the services of a Compose-based configuration.
///
/// When `runServices` is present its length is authoritative. Otherwise the
/// referenced Compose file(s) are read (relative to the devcontainer.json
/// directory) and their `services:` keys unioned. Unreadable files fall
/// back to the primary `service` field.
pub fn count_compose_services(config_dir: &Path, raw: &RawConfig) -> usize {
    if !raw.run_services.is_empty() {
        return raw.run_services.len();
    }

    let services = compose_service_names(config_dir, raw);
    if !services.is_empty() {
        return services.len();
    }

    usize::from(raw.service.is_some())
}

/// Union of service names declared across the referenced Compose files,
/// sorted. Files that can't be read or parsed are skipped.
pub fn compose_service_names(config_dir: &Path, raw: &RawConfig) -> Vec<String> {
    let mut names = BTreeSet::new();
    for file in raw.compose_files() {
        let path = resolve_relative(config_dir, &file);
        let Ok(contents) = std::fs::read_to_string(&path) else {
            tracing::debug!("compose file {} not readable, skipping", path.display());
            continue;
        };
        match serde_yaml::from_str::<ComposeDoc>(&contents) {
            Ok(doc) => names.extend(doc.services.into_keys()),
            Err(e) => tracing::debug!("compose file {} not parseable: {e}", path.display()),
        }
    }
    names.into_iter().collect()
}

/// All services the derived configuration must cover: `runServices` when
/// given, else the services declared in the Compose file(s), else the
/// primary service alone.
pub fn all_services(config_dir: &Path, raw: &RawConfig) -> Vec<String> {
    if !raw.run_services.is_empty() {
        return raw.run_services.clone();
    }
    let from_files = compose_service_names(config_dir, raw);
    if !from_files.is_empty() {
        return from_files;
    }
    raw.service.clone().into_iter().collect()
}

fn resolve_relative(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Extract a normalized port list from `forwardPorts` and `appPort`,
/// enriched with labels from `portsAttributes`.
pub fn extract_ports(raw: &RawConfig, default_service: &str) -> Vec<PortSpec> {
    let mut ports = Vec::new();

    for entry in &raw.forward_ports {
        match entry {
            serde_json::Value::Number(n) => {
                if let Some(port) = as_port(n) {
                    ports.push(PortSpec::new(default_service, port));
                }
            }
            serde_json::Value::String(s) => {
                if let Some(spec) = parse_service_port(s, default_service) {
                    ports.push(spec);
                }
            }
            _ => {}
        }
    }

    if let Some(app_port) = &raw.app_port {
        ports.extend(parse_app_port(app_port, default_service));
    }

    for spec in &mut ports {
        let key = spec.container_port.to_string();
        if let Some(attr) = raw.ports_attributes.get(&key) {
            spec.label = attr.label.clone();
        }
    }

    ports
}

fn as_port(n: &serde_json::Number) -> Option<u16> {
    n.as_u64().and_then(|v| u16::try_from(v).ok()).filter(|&p| p > 0)
}

/// Parse a `forwardPorts` string entry: `"service:port"`, or a bare port.
fn parse_service_port(s: &str, default_service: &str) -> Option<PortSpec> {
    match s.split_once(':') {
        Some((service, port)) => {
            let container_port = port.parse().ok()?;
            Some(PortSpec::new(service, container_port))
        }
        None => {
            let container_port = s.parse().ok()?;
            Some(PortSpec::new(default_service, container_port))
        }
    }
}

/// Parse the `appPort` field: integer, `"host:container"` string, or an
/// array of those.
fn parse_app_port(value: &serde_json::Value, default_service: &str) -> Vec<PortSpec> {
    match value {
        serde_json::Value::Number(n) => as_port(n)
            .map(|p| PortSpec::new(default_service, p))
            .into_iter()
            .collect(),
        serde_json::Value::String(s) => {
            parse_app_port_string(s, default_service).into_iter().collect()
        }
        serde_json::Value::Array(items) => items
            .iter()
            .flat_map(|item| parse_app_port(item, default_service))
            .collect(),
        _ => Vec::new(),
    }
}

/// A single appPort string: `"hostPort:containerPort"` or a bare port.
fn parse_app_port_string(s: &str, default_service: &str) -> Option<PortSpec> {
    match s.split_once(':') {
        Some((host, container)) => {
            let host_port = host.parse().ok()?;
            let container_port = container.parse().ok()?;
            Some(PortSpec {
                service_name: default_service.to_string(),
                container_port,
                host_port,
                protocol: Protocol::Tcp,
                label: None,
            })
        }
        None => {
            let container_port = s.parse().ok()?;
            Some(PortSpec::new(default_service, container_port))
        }
    }
}
