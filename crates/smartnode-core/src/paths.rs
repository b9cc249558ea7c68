use crate::error::{NodeError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const NODE_DIR: &str = ".rocketpool";
pub const GLOBAL_CONFIG_FILE: &str = "config.yml";
pub const USER_CONFIG_FILE: &str = "settings.yml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Resolve the node directory.
///
/// Priority:
/// 1. `--dir` flag / `SMARTNODE_DIR` env var (passed in as `explicit`)
/// 2. `~/.rocketpool`
pub fn resolve_node_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    home::home_dir()
        .map(|h| h.join(NODE_DIR))
        .ok_or(NodeError::HomeNotFound)
}

pub fn global_config_path(dir: &Path) -> PathBuf {
    dir.join(GLOBAL_CONFIG_FILE)
}

pub fn user_config_path(dir: &Path) -> PathBuf {
    dir.join(USER_CONFIG_FILE)
}
