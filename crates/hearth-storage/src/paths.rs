//! Path utilities for Hearth directory resolution.

use anyhow::Result;
use std::path::{Path, PathBuf};

const HEARTH_DIR: &str = "hearth";
const LINKS_FILE: &str = "links.json";
const CONTEXTS_DIR: &str = "contexts";

/// Environment variable to override the Hearth data directory.
const HEARTH_DIR_ENV: &str = "HEARTH_DATA_DIR";

/// Resolve the Hearth data directory.
/// Priority: HEARTH_DATA_DIR env var > platform data dir + "hearth"
pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HEARTH_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|d| d.join(HEARTH_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine platform data directory"))
}

/// Path of the link table inside a data directory.
pub fn links_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LINKS_FILE)
}

/// Directory holding per-identity conversation files.
pub fn contexts_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(CONTEXTS_DIR)
}
