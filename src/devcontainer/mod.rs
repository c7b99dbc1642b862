//! The devcontainer transformation engine.
//!
//! Takes a source devcontainer.json (JSONC permitted), classifies it into
//! one of four patterns, extracts its port requirements, and materializes a
//! worktree-specific copy: a rewritten JSON for the image/dockerfile
//! patterns, or a copied JSON plus a generated Compose override YAML for
//! the Compose patterns. Originals are never mutated.

pub mod compose;
pub mod config;
pub mod jsonc;
pub mod rewrite;
pub mod validate;

pub use compose::{generate_override, rewrite_compose_config, OVERRIDE_FILE_NAME};
pub use config::{
    all_services, count_compose_services, detect_pattern, extract_ports, find_config,
    load_config, parse_config, RawConfig,
};
pub use rewrite::{copy_devcontainer_dir, rewrite_config, write_config};
pub use validate::validate_worktree_config;
