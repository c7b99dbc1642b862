use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "worktree-container", version)]
#[command(about = "Pair each Git worktree with an isolated Dev Container environment")]
#[command(long_about = "worktree-container creates a Git worktree per branch and launches an \
isolated Dev Container environment for it, with deterministically shifted host ports so \
concurrent environments never collide.")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Show verbose debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a worktree and launch its Dev Container environment
    Create {
        /// Branch name to create or check out
        branch: String,

        /// Base commit/branch for a new branch (default: HEAD)
        #[arg(long)]
        base: Option<String>,

        /// Worktree directory path (default: ../<repo>-<name>)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Environment name (default: sanitized branch name)
        #[arg(long, allow_hyphen_values = true)]
        name: Option<String>,

        /// Create the worktree and configuration only, don't start containers
        #[arg(long)]
        no_start: bool,
    },
    /// List all worktree environments
    List {
        /// Filter by status: running, stopped, orphaned, all
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Start a stopped worktree environment
    Start {
        /// Environment name
        name: String,
    },
    /// Stop a worktree environment
    Stop {
        /// Environment name
        name: String,
    },
    /// Restart a worktree environment (stop, then start)
    Restart {
        /// Environment name
        name: String,
    },
    /// Remove a worktree environment and its containers
    Remove {
        /// Environment name
        name: String,

        /// Remove without confirmation
        #[arg(short, long)]
        force: bool,

        /// Keep the Git worktree directory
        #[arg(long)]
        keep_worktree: bool,
    },
    /// Check system requirements (git, Docker, Compose)
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}
