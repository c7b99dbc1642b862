//! Git worktree operations.
//!
//! A thin adapter over the Git CLI. Worktree support in library bindings is
//! limited, and `git worktree` semantics (locking, prunable state, branch
//! checkout rules) are exactly what the CLI implements, so every operation
//! shells `git`. The repository is addressed with `-C <repo>` so the
//! process working directory is never touched, which keeps concurrent
//! invocations safe.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    /// Full ref (`refs/heads/main`); `None` for a detached HEAD.
    pub branch: Option<String>,
    /// Commit the worktree points at.
    pub head: Option<String>,
    pub is_bare: bool,
    pub is_detached: bool,
}

/// Run a git command against a repository, capturing stdout. Failures
/// carry the command and trimmed stderr in a git-class error (exit 5).
async fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let mut full_args: Vec<&str> = Vec::with_capacity(args.len() + 2);
    let repo_str = repo.to_string_lossy();
    full_args.push("-C");
    full_args.push(&repo_str);
    full_args.extend_from_slice(args);

    let command = format!("git {}", args.join(" "));

    let output = tokio::time::timeout(
        GIT_TIMEOUT,
        tokio::process::Command::new("git").args(&full_args).output(),
    )
    .await
    .map_err(|_| Error::Git {
        command: command.clone(),
        stderr: format!("timed out after {} seconds", GIT_TIMEOUT.as_secs()),
    })?
    .map_err(|e| Error::Git {
        command: command.clone(),
        stderr: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(Error::Git {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Create a worktree for a branch. An existing branch is checked out into
/// the new worktree; a missing one is created with `-b` from `base`
/// (defaulting to HEAD when `base` is `None`).
pub async fn add(
    repo: &Path,
    branch: &str,
    worktree_path: &Path,
    base: Option<&str>,
) -> Result<()> {
    let path_str = worktree_path.to_string_lossy().into_owned();

    if branch_exists(repo, branch).await {
        run_git(repo, &["worktree", "add", &path_str, branch]).await?;
        return Ok(());
    }

    let mut args = vec!["worktree", "add", "-b", branch, &path_str];
    if let Some(base) = base {
        args.push(base);
    }
    run_git(repo, &args).await?;
    Ok(())
}

/// List all worktrees of a repository via the porcelain format.
pub async fn list(repo: &Path) -> Result<Vec<WorktreeInfo>> {
    let output = run_git(repo, &["worktree", "list", "--porcelain"]).await?;
    Ok(parse_porcelain(&output))
}

/// Remove a worktree. `force` allows removal despite untracked or
/// modified files.
pub async fn remove(repo: &Path, worktree_path: &Path, force: bool) -> Result<()> {
    let path_str = worktree_path.to_string_lossy().into_owned();
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(&path_str);
    run_git(repo, &args).await?;
    Ok(())
}

/// Whether a directory is a linked worktree: its `.git` entry is a FILE
/// whose first line starts with `gitdir:`, as opposed to the `.git`
/// directory of a primary checkout.
pub fn is_worktree(path: &Path) -> bool {
    let git_path = path.join(".git");
    let Ok(metadata) = std::fs::symlink_metadata(&git_path) else {
        return false;
    };
    if metadata.is_dir() {
        return false;
    }
    match std::fs::read_to_string(&git_path) {
        Ok(contents) => contents
            .lines()
            .next()
            .is_some_and(|line| line.starts_with("gitdir:")),
        Err(_) => false,
    }
}

/// Top-level directory of the working tree containing `path`.
pub async fn repo_root(path: &Path) -> Result<PathBuf> {
    let output = run_git(path, &["rev-parse", "--show-toplevel"]).await?;
    Ok(PathBuf::from(output.trim()))
}

/// Short name of the currently checked-out branch (`HEAD` when detached).
pub async fn current_branch(path: &Path) -> Result<String> {
    let output = run_git(path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
    Ok(output.trim().to_string())
}

/// Whether a ref resolves in the repository.
pub async fn branch_exists(repo: &Path, branch: &str) -> bool {
    run_git(repo, &["rev-parse", "--verify", "--quiet", branch])
        .await
        .is_ok()
}

/// Parse `git worktree list --porcelain` output. Blocks are separated by
/// blank lines; each holds a `worktree <path>` line plus optional
/// `HEAD <sha>`, `branch <ref>`, `bare`, and `detached` lines.
fn parse_porcelain(output: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeInfo> = None;

    for line in output.lines() {
        if line.is_empty() {
            if let Some(info) = current.take() {
                worktrees.push(info);
            }
            continue;
        }

        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        match key {
            "worktree" => {
                if let Some(info) = current.take() {
                    worktrees.push(info);
                }
                current = Some(WorktreeInfo {
                    path: PathBuf::from(value),
                    branch: None,
                    head: None,
                    is_bare: false,
                    is_detached: false,
                });
            }
            "HEAD" => {
                if let Some(info) = current.as_mut() {
                    info.head = Some(value.to_string());
                }
            }
            "branch" => {
                if let Some(info) = current.as_mut() {
                    info.branch = Some(value.to_string());
                }
            }
            "bare" => {
                if let Some(info) = current.as_mut() {
                    info.is_bare = true;
                }
            }
            "detached" => {
                if let Some(info) = current.as_mut() {
                    info.is_detached = true;
                }
            }
            _ => {}
        }
    }

    if let Some(info) = current.take() {
        worktrees.push(info);
    }

    worktrees
}
