//! # worktree-container
//!
//! A command-line orchestrator that pairs each Git worktree of a project
//! with an isolated Dev Container environment. Given a repository carrying
//! a devcontainer.json, it creates a secondary working tree for a branch,
//! materializes a worktree-specific copy of the configuration with
//! deterministically shifted host ports and identifying labels, launches
//! the containers, and manages their lifecycle across concurrent
//! environments on one developer machine.
//!
//! ## Design
//!
//! - **No state file**: Docker container labels are the sole source of
//!   truth; every environment is reconstructed from them (see
//!   [`docker::label`]). The tool stays idempotent across crashes and
//!   reinstalls.
//! - **Deterministic ports**: `shifted = original + index * 10_000`, so a
//!   developer can predict every environment's ports without running a
//!   command (see [`port`]).
//! - **Originals are read-only**: the transformation engine writes a
//!   derived configuration into the worktree and never mutates the source
//!   repository (see [`devcontainer`]).

pub mod commands;
pub mod devcontainer;
pub mod docker;
pub mod error;
pub mod model;
pub mod output;
pub mod port;
pub mod worktree;

pub use error::{Error, Result};
pub use model::{
    ConfigPattern, ContainerInfo, PortAllocation, PortSpec, Protocol, WorktreeEnv,
    WorktreeStatus,
};
