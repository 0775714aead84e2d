//! Hierarchical settings loader with precedence
//!
//! Loads settings from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Global settings (~/.cfgsync/config.yaml)
//! 3. Project settings (cfgsync.yaml in the working directory, or an explicit path)
//! 4. Environment variables (CFGSYNC_* prefix)
//! 5. CLI flags (handled by caller)
//!
//! File layers are deep-merged as YAML before the result is deserialized,
//! so a layer only needs to name the keys it overrides.

use crate::error::{Error, Result};
use crate::types::{CfgsyncSettings, StorageBackendKind};
use crate::utils::get_home_dir;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::Value;
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Project settings file names to search for
const SETTINGS_FILE_NAMES: &[&str] = &["cfgsync.yaml", "cfgsync.yml"];

/// Settings hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Directory holding the global settings file, if any
    global_dir: Option<Utf8PathBuf>,
}

impl HierarchicalConfigLoader {
    /// Create a loader reading global settings from ~/.cfgsync
    pub fn new() -> Self {
        let global_dir = get_home_dir()
            .ok()
            .and_then(|home| Utf8PathBuf::from_path_buf(home).ok())
            .map(|home| home.join(".cfgsync"));
        Self { global_dir }
    }

    /// Create a loader with a custom global directory (or none)
    pub fn with_global_dir(global_dir: Option<Utf8PathBuf>) -> Self {
        Self { global_dir }
    }

    /// Load settings for a project
    ///
    /// With `explicit` set, that file must exist. Otherwise `cfgsync.yaml` or
    /// `cfgsync.yml` is looked up in `working_dir`; without one the defaults
    /// apply. Relative paths are resolved against the project file's
    /// directory (or `working_dir`).
    pub fn load(
        &self,
        explicit: Option<&Utf8Path>,
        working_dir: &Utf8Path,
    ) -> Result<CfgsyncSettings> {
        let mut merged = Self::load_embedded("defaults.yaml")?;

        if let Some(global_dir) = &self.global_dir {
            let global_path = global_dir.join("config.yaml");
            if global_path.is_file() {
                debug!("Merging global settings from {}", global_path);
                merge_values(&mut merged, Self::load_yaml_file(&global_path)?);
            }
        }

        let project_path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(Error::settings_not_found(path.as_str()));
                }
                Some(path.to_owned())
            }
            None => Self::find_project_file(working_dir),
        };

        let base_dir = match &project_path {
            Some(path) => {
                debug!("Merging project settings from {}", path);
                merge_values(&mut merged, Self::load_yaml_file(path)?);
                path.parent()
                    .filter(|p| !p.as_str().is_empty())
                    .map(|p| p.to_owned())
                    .unwrap_or_else(|| working_dir.to_owned())
            }
            None => working_dir.to_owned(),
        };

        let mut settings: CfgsyncSettings = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_settings(format!("Failed to parse settings: {}", e)))?;

        Self::apply_env_overrides(&mut settings)?;
        settings.resolve_paths(&base_dir);

        Ok(settings)
    }

    fn find_project_file(dir: &Utf8Path) -> Option<Utf8PathBuf> {
        SETTINGS_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load an embedded configuration file
    fn load_embedded(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::settings_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_settings(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_settings(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_settings(format!("Failed to parse {}: {}", path, e)))
    }

    /// Apply environment variable overrides to settings
    fn apply_env_overrides(settings: &mut CfgsyncSettings) -> Result<()> {
        if let Ok(val) = env::var("CFGSYNC_ACTIVE_DIR") {
            settings.active.path = Utf8PathBuf::from(val);
        }

        if let Ok(val) = env::var("CFGSYNC_ACTIVE_BACKEND") {
            settings.active.backend = val
                .parse::<StorageBackendKind>()
                .map_err(|e| Error::invalid_settings(format!("CFGSYNC_ACTIVE_BACKEND: {}", e)))?;
        }

        if let Ok(val) = env::var("CFGSYNC_SYNC_DIR") {
            settings.sync.path = Utf8PathBuf::from(val);
        }

        if let Ok(val) = env::var("CFGSYNC_STATE_DIR") {
            settings.state_dir = Utf8PathBuf::from(val);
        }

        if let Ok(val) = env::var("CFGSYNC_STRICT_SCHEMA") {
            settings.schema.strict = parse_bool(&val).ok_or_else(|| {
                Error::invalid_settings("CFGSYNC_STRICT_SCHEMA must be true or false")
            })?;
        }

        Ok(())
    }
}

impl Default for HierarchicalConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything
/// else is replaced
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}
