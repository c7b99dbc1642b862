//! End-to-end `create --no-start` flows: Git worktree creation plus the
//! devcontainer transformation, with container launch skipped so no Docker
//! daemon is required.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn wtc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_worktree-container"))
}

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .expect("failed to run git");
    assert!(status.success(), "git {args:?} failed");
}

/// Create a repository with one commit and the given .devcontainer files.
fn setup_repo(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let repo = dir.path().join("project");
    std::fs::create_dir(&repo).unwrap();

    git(&repo, &["init", "-b", "main"]);
    git(&repo, &["config", "user.email", "test@example.com"]);
    git(&repo, &["config", "user.name", "Test"]);

    for (rel_path, contents) in files {
        let path = repo.join(rel_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-m", "init"]);

    (dir, repo)
}

#[test]
fn image_pattern_create_writes_rewritten_config() {
    let (dir, repo) = setup_repo(&[(
        ".devcontainer/devcontainer.json",
        r#"{
            // dev image
            "name": "project",
            "image": "node:20",
            "appPort": ["3000:3000"],
            "portsAttributes": {"3000": {"label": "App"}},
            "customizations": {"vscode": {"extensions": ["dbaeumer.vscode-eslint"]}}
        }"#,
    )]);
    let worktree = dir.path().join("project-feature-auth");

    let output = wtc()
        .current_dir(&repo)
        .args([
            "create",
            "feature/auth",
            "--no-start",
            "--path",
            worktree.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run binary");
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Created worktree environment \"feature-auth\""));
    assert!(stdout.contains("Branch:    feature/auth"));

    // The worktree is a real linked worktree on the requested branch.
    assert!(worktree.join(".git").is_file());

    // The source configuration is untouched.
    let original =
        std::fs::read_to_string(repo.join(".devcontainer/devcontainer.json")).unwrap();
    assert!(original.contains("// dev image"));

    // The derived configuration carries the environment identity.
    let rewritten =
        std::fs::read_to_string(worktree.join(".devcontainer/devcontainer.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
    assert_eq!(config["name"], "feature-auth");
    assert_eq!(config["image"], "node:20");
    assert_eq!(config["containerEnv"]["WORKTREE_NAME"], "feature-auth");
    assert!(config["containerEnv"]["WORKTREE_INDEX"]
        .as_str()
        .unwrap()
        .parse::<u8>()
        .is_ok());
    assert_eq!(
        config["customizations"]["vscode"]["extensions"][0],
        "dbaeumer.vscode-eslint"
    );

    // appPort is rewritten to a shifted host port for container port 3000.
    let app_port = config["appPort"][0].as_str().unwrap();
    let (host, container) = app_port.split_once(':').unwrap();
    assert_eq!(container, "3000");
    let host: u32 = host.parse().unwrap();
    assert!(host >= 1024);

    // portsAttributes follows the shifted key.
    assert_eq!(config["portsAttributes"][&host.to_string()]["label"], "App");

    // Labels ride in runArgs for the non-compose patterns.
    let run_args = rewritten.clone();
    assert!(run_args.contains("worktree.managed-by=worktree-container"));
    assert!(run_args.contains("worktree.name=feature-auth"));
}

#[test]
fn compose_pattern_create_generates_override_yaml() {
    let (dir, repo) = setup_repo(&[
        (
            ".devcontainer/devcontainer.json",
            r#"{
                "name": "project",
                "dockerComposeFile": "docker-compose.yml",
                "service": "app",
                "runServices": ["app", "db"],
                "forwardPorts": [3000, "db:5432"]
            }"#,
        ),
        (
            ".devcontainer/docker-compose.yml",
            "services:\n  app:\n    image: node:20\n    ports:\n      - \"3000:3000\"\n  db:\n    image: postgres:16\n",
        ),
    ]);
    let worktree = dir.path().join("project-compose-env");

    let output = wtc()
        .current_dir(&repo)
        .args([
            "create",
            "compose-env",
            "--no-start",
            "--path",
            worktree.to_str().unwrap(),
            "--json",
        ])
        .output()
        .expect("failed to run binary");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // JSON result has the contract shape.
    let result: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(result["name"], "compose-env");
    assert_eq!(result["configPattern"], "compose-multi");
    assert_eq!(result["status"], "stopped");
    let services = result["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);

    // The override YAML isolates the project and replaces ports per service.
    let override_path = worktree.join(".devcontainer/docker-compose.worktree.yml");
    let override_yaml = std::fs::read_to_string(&override_path).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&override_yaml).unwrap();
    assert_eq!(doc["name"], "compose-env");
    assert_eq!(
        doc["services"]["app"]["labels"]["worktree.managed-by"],
        "worktree-container"
    );
    assert_eq!(
        doc["services"]["db"]["labels"]["worktree.config-pattern"],
        "compose-multi"
    );
    let app_port = doc["services"]["app"]["ports"][0].as_str().unwrap();
    assert!(app_port.ends_with(":3000"), "{app_port}");
    let db_port = doc["services"]["db"]["ports"][0].as_str().unwrap();
    assert!(db_port.ends_with(":5432"), "{db_port}");

    // The rewritten JSON appends the override as the last compose file and
    // leaves port fields alone.
    let rewritten =
        std::fs::read_to_string(worktree.join(".devcontainer/devcontainer.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
    assert_eq!(config["name"], "compose-env");
    assert_eq!(
        config["dockerComposeFile"],
        serde_json::json!(["docker-compose.yml", "docker-compose.worktree.yml"])
    );
    assert_eq!(config["forwardPorts"], serde_json::json!([3000, "db:5432"]));
}

#[test]
fn supporting_files_copied_into_worktree() {
    let (dir, repo) = setup_repo(&[
        (
            ".devcontainer/devcontainer.json",
            r#"{"build": {"dockerfile": "Dockerfile"}}"#,
        ),
        (".devcontainer/Dockerfile", "FROM node:20\n"),
        (".devcontainer/scripts/post-create.sh", "#!/bin/sh\necho ok\n"),
    ]);
    let worktree = dir.path().join("project-build-env");

    let output = wtc()
        .current_dir(&repo)
        .args([
            "create",
            "build-env",
            "--no-start",
            "--path",
            worktree.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run binary");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(worktree.join(".devcontainer/Dockerfile").is_file());
    assert!(worktree.join(".devcontainer/scripts/post-create.sh").is_file());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Pattern:   dockerfile"));
}

#[test]
fn invalid_environment_name_rejected() {
    let (dir, repo) = setup_repo(&[(
        ".devcontainer/devcontainer.json",
        r#"{"image": "node:20"}"#,
    )]);
    let worktree = dir.path().join("unused");

    let output = wtc()
        .current_dir(&repo)
        .args([
            "create",
            "branch",
            "--name",
            "-bad-name-",
            "--no-start",
            "--path",
            worktree.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run binary");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid environment name"), "{stderr}");
    // Nothing was created.
    assert!(!worktree.exists());
}

#[test]
fn missing_devcontainer_config_exits_two() {
    let (dir, repo) = setup_repo(&[("README.md", "no devcontainer here\n")]);
    let worktree = dir.path().join("project-nocfg");

    let output = wtc()
        .current_dir(&repo)
        .args([
            "create",
            "nocfg",
            "--no-start",
            "--path",
            worktree.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run binary");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("devcontainer.json not found"), "{stderr}");
}

#[test]
fn existing_branch_checked_out_into_worktree() {
    let (dir, repo) = setup_repo(&[(
        ".devcontainer/devcontainer.json",
        r#"{"image": "node:20"}"#,
    )]);
    git(&repo, &["branch", "existing-branch"]);
    let worktree = dir.path().join("project-existing-branch");

    let output = wtc()
        .current_dir(&repo)
        .args([
            "create",
            "existing-branch",
            "--no-start",
            "--path",
            worktree.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run binary");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let head = Command::new("git")
        .arg("-C")
        .arg(&worktree)
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&head.stdout).trim(), "existing-branch");
}
