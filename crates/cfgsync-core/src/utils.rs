//! Shared utility functions for cfgsync crates

use anyhow::anyhow;
use std::path::PathBuf;

/// Get the user's home directory
///
/// The HOME environment variable wins over dirs::home_dir() so tests and
/// containers can point global settings elsewhere.
pub fn get_home_dir() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))
}
