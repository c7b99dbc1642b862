//! Compose override YAML generation and devcontainer.json rewriting for
//! the Compose patterns.
//!
//! Isolation for Compose environments works differently from the image and
//! dockerfile patterns: labels and shifted ports go into a generated
//! override file rather than the JSON, and the override's top-level `name`
//! sets the Compose project name, which namespaces container, network, and
//! volume names per environment without touching the base Compose file.

use super::jsonc;
use crate::error::{Error, Result};
use crate::model::PortAllocation;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Filename of the generated override, placed next to the rewritten
/// devcontainer.json and appended to its `dockerComposeFile` list.
pub const OVERRIDE_FILE_NAME: &str = "docker-compose.worktree.yml";

#[derive(Debug, Serialize)]
struct ComposeOverride {
    /// Becomes COMPOSE_PROJECT_NAME, isolating container names, networks,
    /// and named volumes across environments.
    name: String,
    services: BTreeMap<String, ServiceOverride>,
}

#[derive(Debug, Serialize)]
struct ServiceOverride {
    /// Compose REPLACES (does not merge) the `ports` sequence from an
    /// override file, so the full shifted mapping set is emitted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    /// Every service carries the full label map so container discovery is
    /// uniform regardless of which service a container belongs to.
    labels: BTreeMap<String, String>,
}

/// Generate the override YAML for an environment. `services` is every
/// service listed in the source configuration; the map is emitted sorted.
pub fn generate_override(
    env_name: &str,
    services: &[String],
    allocations: &[PortAllocation],
    labels: &BTreeMap<String, String>,
) -> Result<String> {
    let mut per_service: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for alloc in allocations {
        per_service
            .entry(alloc.service_name.as_str())
            .or_default()
            .push(format!("{}:{}", alloc.host_port, alloc.container_port));
    }

    let mut override_services = BTreeMap::new();
    for service in services {
        override_services.insert(
            service.clone(),
            ServiceOverride {
                ports: per_service.remove(service.as_str()).unwrap_or_default(),
                labels: labels.clone(),
            },
        );
    }

    let doc = ComposeOverride {
        name: env_name.to_string(),
        services: override_services,
    };

    let body = serde_yaml::to_string(&doc)?;
    let header = format!(
        "# Auto-generated by worktree-container for environment {env_name:?}\n\
         # DO NOT EDIT - regenerated on each create\n"
    );
    Ok(header + &body)
}

/// Rewrite a devcontainer.json for the Compose patterns. Only two changes
/// are made: the `name` field, and `dockerComposeFile` normalized to an
/// array with the override path appended idempotently as the last entry.
/// Ports, labels, and environment variables are the override file's job.
pub fn rewrite_compose_config(
    raw_json: &str,
    env_name: &str,
    override_path: &str,
) -> Result<String> {
    let clean = jsonc::strip(raw_json);
    let mut config = match serde_json::from_str::<Value>(&clean)? {
        Value::Object(map) => map,
        _ => {
            return Err(Error::Validation(
                "devcontainer.json must contain a top-level object".to_string(),
            ))
        }
    };

    config.insert("name".into(), Value::String(env_name.to_string()));

    let files = append_compose_file(config.get("dockerComposeFile"), override_path);
    config.insert("dockerComposeFile".into(), Value::Array(files));

    let mut out = serde_json::to_string_pretty(&config)?;
    out.push('\n');
    Ok(out)
}

/// Normalize `dockerComposeFile` to an array and append the override path
/// unless already present (a `create` re-run must not duplicate it). The
/// override must stay last: Compose merges files in order.
fn append_compose_file(existing: Option<&Value>, override_path: &str) -> Vec<Value> {
    let mut files = match existing {
        Some(Value::String(s)) => vec![Value::String(s.clone())],
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let already_present = files
        .iter()
        .any(|f| f.as_str() == Some(override_path));
    if !already_present {
        files.push(Value::String(override_path.to_string()));
    }
    files
}
