//! Generation of worktree-specific devcontainer.json files for the image
//! and dockerfile patterns.
//!
//! The original devcontainer.json is never modified. The rewrite parses the
//! comment-stripped source into a generic [`serde_json::Map`] so that every
//! field unknown to this crate survives verbatim, applies the
//! worktree-specific modifications, and serializes back with two-space
//! indentation and a trailing newline.

use super::jsonc;
use crate::error::{Error, Result};
use crate::model::PortAllocation;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Rewrite a raw devcontainer.json (JSONC allowed) for one worktree
/// environment. Applies, in order: the environment name, `--label` pairs in
/// `runArgs`, the shifted `appPort` list, `portsAttributes` re-keying, and
/// the `WORKTREE_NAME` / `WORKTREE_INDEX` container environment.
pub fn rewrite_config(
    raw_json: &str,
    env_name: &str,
    worktree_index: u8,
    allocations: &[PortAllocation],
    labels: &BTreeMap<String, String>,
) -> Result<String> {
    let mut config = parse_object(raw_json)?;

    config.insert("name".into(), Value::String(env_name.to_string()));
    apply_run_args_labels(&mut config, labels);
    apply_app_port_shift(&mut config, allocations);
    apply_ports_attributes_shift(&mut config, allocations);
    apply_container_env(&mut config, env_name, worktree_index);

    serialize(&config)
}

fn parse_object(raw_json: &str) -> Result<Map<String, Value>> {
    let clean = jsonc::strip(raw_json);
    match serde_json::from_str::<Value>(&clean)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Validation(
            "devcontainer.json must contain a top-level object".to_string(),
        )),
    }
}

fn serialize(config: &Map<String, Value>) -> Result<String> {
    let mut out = serde_json::to_string_pretty(config)?;
    out.push('\n');
    Ok(out)
}

/// Append `--label key=value` pairs to `runArgs`, creating the array when
/// absent. A `BTreeMap` input keeps the emitted order deterministic.
fn apply_run_args_labels(config: &mut Map<String, Value>, labels: &BTreeMap<String, String>) {
    let mut run_args = match config.get("runArgs") {
        Some(Value::Array(existing)) => existing.clone(),
        _ => Vec::new(),
    };

    for (key, value) in labels {
        run_args.push(Value::String("--label".to_string()));
        run_args.push(Value::String(format!("{key}={value}")));
    }

    config.insert("runArgs".into(), Value::Array(run_args));
}

/// Replace `appPort` with the shifted `"host:container"` mappings in
/// allocation order. An empty allocation set removes the field entirely
/// rather than leaving an empty array.
fn apply_app_port_shift(config: &mut Map<String, Value>, allocations: &[PortAllocation]) {
    if allocations.is_empty() {
        config.remove("appPort");
        return;
    }

    let ports = allocations
        .iter()
        .map(|a| Value::String(format!("{}:{}", a.host_port, a.container_port)))
        .collect();
    config.insert("appPort".into(), Value::Array(ports));
}

/// Re-key `portsAttributes` entries from container ports to the shifted
/// host ports so IDE tooling attaches metadata to the ports the developer
/// actually sees. Entries with no matching allocation are preserved as-is.
fn apply_ports_attributes_shift(config: &mut Map<String, Value>, allocations: &[PortAllocation]) {
    let Some(Value::Object(old_attrs)) = config.get("portsAttributes") else {
        return;
    };

    let mapping: BTreeMap<String, u16> = allocations
        .iter()
        .map(|a| (a.container_port.to_string(), a.host_port))
        .collect();

    let mut new_attrs = Map::new();
    for (port_key, attr) in old_attrs {
        match mapping.get(port_key) {
            Some(host_port) => new_attrs.insert(host_port.to_string(), attr.clone()),
            None => new_attrs.insert(port_key.clone(), attr.clone()),
        };
    }

    config.insert("portsAttributes".into(), Value::Object(new_attrs));
}

/// Set `WORKTREE_NAME` and `WORKTREE_INDEX` in `containerEnv`, preserving
/// existing entries.
fn apply_container_env(config: &mut Map<String, Value>, env_name: &str, worktree_index: u8) {
    let mut env = match config.get("containerEnv") {
        Some(Value::Object(existing)) => existing.clone(),
        _ => Map::new(),
    };

    env.insert("WORKTREE_NAME".into(), Value::String(env_name.to_string()));
    env.insert(
        "WORKTREE_INDEX".into(),
        Value::String(worktree_index.to_string()),
    );

    config.insert("containerEnv".into(), Value::Object(env));
}

/// Write rewritten configuration bytes, creating parent directories.
/// Writes are last-writer-wins; a `create` re-run overwrites the previous
/// derived files.
pub fn write_config(output_path: &Path, data: &str) -> Result<()> {
    if let Some(dir) = output_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(output_path, data)?;
    Ok(())
}

/// Copy the source `.devcontainer/` directory into the worktree, preserving
/// file modes. The `devcontainer.json` itself is skipped at any depth (it
/// is rewritten separately), as are symbolic links.
pub fn copy_devcontainer_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            copy_devcontainer_dir(&src_path, &dst_path)?;
            continue;
        }
        if entry.file_name().eq_ignore_ascii_case("devcontainer.json") {
            continue;
        }
        // fs::copy carries permission bits along with the contents.
        std::fs::copy(&src_path, &dst_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    fn alloc(service: &str, container: u16, host: u16) -> PortAllocation {
        PortAllocation {
            service_name: service.to_string(),
            container_port: container,
            host_port: host,
            protocol: Protocol::Tcp,
            label: None,
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn pattern_a_rewrite_with_port_shift() {
        let input = r#"{"name":"x","image":"node:20","appPort":["3000:3000"],
            "portsAttributes":{"3000":{"label":"App"}}}"#;
        let out = rewrite_config(
            input,
            "env-1",
            1,
            &[alloc("app", 3000, 13000)],
            &labels(&[("worktree.name", "env-1")]),
        )
        .unwrap();

        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["name"], "env-1");
        assert_eq!(v["appPort"], serde_json::json!(["13000:3000"]));
        assert_eq!(v["portsAttributes"]["13000"]["label"], "App");
        assert!(v["portsAttributes"].get("3000").is_none());
        assert_eq!(v["image"], "node:20");
        assert_eq!(v["containerEnv"]["WORKTREE_NAME"], "env-1");
        assert_eq!(v["containerEnv"]["WORKTREE_INDEX"], "1");

        let run_args = v["runArgs"].as_array().unwrap();
        let pos = run_args.iter().position(|a| a == "--label").unwrap();
        assert_eq!(run_args[pos + 1], "worktree.name=env-1");
    }

    #[test]
    fn unknown_fields_preserved_verbatim() {
        let input = r#"{
            "image": "node:20",
            "workspaceFolder": "/workspaces/app",
            "features": {"ghcr.io/devcontainers/features/node:1": {}},
            "customizations": {"vscode": {"extensions": ["rust-lang.rust-analyzer"]}},
            "postCreateCommand": "npm install"
        }"#;
        let out = rewrite_config(input, "env-1", 1, &[], &BTreeMap::new()).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["workspaceFolder"], "/workspaces/app");
        assert_eq!(v["postCreateCommand"], "npm install");
        assert!(v["features"]
            .get("ghcr.io/devcontainers/features/node:1")
            .is_some());
        assert_eq!(
            v["customizations"]["vscode"]["extensions"][0],
            "rust-lang.rust-analyzer"
        );
    }

    #[test]
    fn empty_allocations_remove_app_port_entirely() {
        let input = r#"{"image":"node:20","appPort":[3000]}"#;
        let out = rewrite_config(input, "env-1", 1, &[], &BTreeMap::new()).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert!(v.get("appPort").is_none());
    }

    #[test]
    fn run_args_appended_after_existing_in_key_order() {
        let input = r#"{"image":"node:20","runArgs":["--privileged"]}"#;
        let out = rewrite_config(
            input,
            "env-1",
            2,
            &[],
            &labels(&[
                ("worktree.name", "env-1"),
                ("worktree.branch", "feat"),
                ("worktree.managed-by", "worktree-container"),
            ]),
        )
        .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        let args: Vec<&str> = v["runArgs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a.as_str().unwrap())
            .collect();
        assert_eq!(
            args,
            vec![
                "--privileged",
                "--label",
                "worktree.branch=feat",
                "--label",
                "worktree.managed-by=worktree-container",
                "--label",
                "worktree.name=env-1",
            ]
        );
    }

    #[test]
    fn existing_container_env_preserved() {
        let input = r#"{"image":"node:20","containerEnv":{"FOO":"bar"}}"#;
        let out = rewrite_config(input, "env-1", 3, &[], &BTreeMap::new()).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["containerEnv"]["FOO"], "bar");
        assert_eq!(v["containerEnv"]["WORKTREE_INDEX"], "3");
    }

    #[test]
    fn ports_attributes_without_allocation_preserved() {
        let input = r#"{"image":"x","portsAttributes":{"3000":{"label":"App"},"9229":{"label":"Debugger"}}}"#;
        let out =
            rewrite_config(input, "e", 1, &[alloc("app", 3000, 13000)], &BTreeMap::new()).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["portsAttributes"]["13000"]["label"], "App");
        assert_eq!(v["portsAttributes"]["9229"]["label"], "Debugger");
    }

    #[test]
    fn output_is_jsonc_free_and_newline_terminated() {
        let input = "{\n  // image to use\n  \"image\": \"node:20\",\n}";
        let out = rewrite_config(input, "env-1", 1, &[], &BTreeMap::new()).unwrap();
        assert!(out.ends_with('\n'));
        assert!(!out.contains("//"));
        serde_json::from_str::<Value>(&out).unwrap();
    }

    #[test]
    fn top_level_array_rejected() {
        assert!(rewrite_config("[1,2]", "e", 1, &[], &BTreeMap::new()).is_err());
    }

    #[test]
    fn copy_skips_devcontainer_json_and_symlinks() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("devcontainer.json"), "{}").unwrap();
        std::fs::write(src.path().join("Dockerfile"), "FROM node:20\n").unwrap();
        std::fs::create_dir(src.path().join("scripts")).unwrap();
        std::fs::write(src.path().join("scripts/setup.sh"), "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            src.path().join("Dockerfile"),
            src.path().join("Dockerfile.link"),
        )
        .unwrap();

        let dest = dst.path().join(".devcontainer");
        copy_devcontainer_dir(src.path(), &dest).unwrap();

        assert!(dest.join("Dockerfile").is_file());
        assert!(dest.join("scripts/setup.sh").is_file());
        assert!(!dest.join("devcontainer.json").exists());
        #[cfg(unix)]
        assert!(!dest.join("Dockerfile.link").exists());
    }

    #[test]
    fn copy_of_config_only_directory_creates_destination() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("devcontainer.json"), "{}").unwrap();

        let dest = dst.path().join(".devcontainer");
        copy_devcontainer_dir(src.path(), &dest).unwrap();
        assert!(dest.is_dir());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn copy_preserves_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let script = src.path().join("init.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dest = dst.path().join(".devcontainer");
        copy_devcontainer_dir(src.path(), &dest).unwrap();
        let mode = dest.join("init.sh").metadata().unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
