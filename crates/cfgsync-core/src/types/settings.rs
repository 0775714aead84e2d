//! Settings types for cfgsync.yaml
//!
//! These types control where the active and sync storages live, where
//! import state (lock file, ledger, extension manifest) is kept, and how
//! strictly documents are validated.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Complete cfgsync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CfgsyncSettings {
    /// Storage governing live behavior
    #[serde(default)]
    pub active: ActiveStorageSettings,

    /// Storage holding the proposed configuration
    #[serde(default)]
    pub sync: SyncStorageSettings,

    /// Directory for the lock file, import ledger and extension manifest
    #[serde(default = "default_state_dir")]
    pub state_dir: Utf8PathBuf,

    /// Extension catalog settings
    #[serde(default)]
    pub extensions: ExtensionSettings,

    /// Schema validation settings
    #[serde(default)]
    pub schema: SchemaSettings,

    /// Import behavior
    #[serde(default)]
    pub import: ImportSettings,

    /// Config entity types known to single-item import
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDefinition>,
}

impl Default for CfgsyncSettings {
    fn default() -> Self {
        Self {
            active: ActiveStorageSettings::default(),
            sync: SyncStorageSettings::default(),
            state_dir: default_state_dir(),
            extensions: ExtensionSettings::default(),
            schema: SchemaSettings::default(),
            import: ImportSettings::default(),
            entity_types: Vec::new(),
        }
    }
}

impl CfgsyncSettings {
    /// Path of the JSON-lines import ledger
    pub fn ledger_path(&self) -> Utf8PathBuf {
        self.state_dir.join("import_log.jsonl")
    }

    /// Path of the installed-extensions manifest
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.state_dir.join("extensions.yaml")
    }

    /// Look up an entity type definition by id
    pub fn entity_type(&self, id: &str) -> Option<&EntityTypeDefinition> {
        self.entity_types.iter().find(|t| t.id == id)
    }

    /// Resolve every relative path against `base`
    pub fn resolve_paths(&mut self, base: &Utf8Path) {
        let resolve = |path: &mut Utf8PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.active.path);
        resolve(&mut self.sync.path);
        resolve(&mut self.state_dir);
        if let Some(catalog) = self.extensions.catalog.as_mut() {
            resolve(catalog);
        }
        if let Some(dir) = self.schema.dir.as_mut() {
            resolve(dir);
        }
    }
}

/// Backend used for the active storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// One YAML file per document
    #[default]
    File,
    /// Embedded key/value database
    Database,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "database" | "db" => Ok(Self::Database),
            other => Err(format!(
                "unknown storage backend '{}', expected 'file' or 'database'",
                other
            )),
        }
    }
}

/// Active storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActiveStorageSettings {
    #[serde(default)]
    pub backend: StorageBackendKind,

    #[serde(default = "default_active_path")]
    pub path: Utf8PathBuf,
}

impl Default for ActiveStorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            path: default_active_path(),
        }
    }
}

/// Sync storage settings (always file based)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncStorageSettings {
    #[serde(default = "default_sync_path")]
    pub path: Utf8PathBuf,
}

impl Default for SyncStorageSettings {
    fn default() -> Self {
        Self {
            path: default_sync_path(),
        }
    }
}

/// Extension catalog settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtensionSettings {
    /// YAML file listing the extensions that may be installed
    #[serde(default)]
    pub catalog: Option<Utf8PathBuf>,
}

/// Schema validation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchemaSettings {
    /// Directory of `*.schema.json` files replacing the embedded schemas
    #[serde(default)]
    pub dir: Option<Utf8PathBuf>,

    /// Reject documents that no schema covers
    #[serde(default)]
    pub strict: bool,
}

/// Import behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportSettings {
    /// Key of the importer lock
    #[serde(default = "default_lock_key")]
    pub lock_key: String,

    /// Top-level keys removed from sync documents before comparison
    #[serde(default)]
    pub strip_keys: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            lock_key: default_lock_key(),
            strip_keys: Vec::new(),
        }
    }
}

/// Definition of a config entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EntityTypeDefinition {
    /// Machine name of the entity type (e.g. `image_style`)
    pub id: String,

    /// Human readable label
    pub label: String,

    /// Prefix of the config names of this type (e.g. `image.style`)
    pub config_prefix: String,

    /// Key holding the entity id inside the document
    #[serde(default = "default_id_key")]
    pub id_key: String,
}

impl EntityTypeDefinition {
    /// Config name of the entity with the given id
    pub fn config_name(&self, id: &str) -> String {
        format!("{}.{}", self.config_prefix, id)
    }
}

/// Default lock key shared by every importer
pub const DEFAULT_LOCK_KEY: &str = "config_importer";

fn default_lock_key() -> String {
    DEFAULT_LOCK_KEY.to_string()
}

fn default_id_key() -> String {
    "id".to_string()
}

fn default_state_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".cfgsync")
}

fn default_active_path() -> Utf8PathBuf {
    Utf8PathBuf::from("config/active")
}

fn default_sync_path() -> Utf8PathBuf {
    Utf8PathBuf::from("config/sync")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CfgsyncSettings::default();
        assert_eq!(settings.active.backend, StorageBackendKind::File);
        assert_eq!(settings.import.lock_key, "config_importer");
        assert_eq!(settings.ledger_path(), Utf8PathBuf::from(".cfgsync/import_log.jsonl"));
    }

    #[test]
    fn test_deserialize_kebab_case() {
        let yaml = r#"
active:
  backend: database
  path: db/active
state-dir: var/state
schema:
  strict: true
import:
  strip-keys: [_core]
entity-types:
  - id: image_style
    label: Image style
    config-prefix: image.style
    id-key: name
"#;
        let settings: CfgsyncSettings = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(settings.active.backend, StorageBackendKind::Database);
        assert!(settings.schema.strict);
        assert_eq!(settings.import.strip_keys, vec!["_core"]);
        let style = settings.entity_type("image_style").unwrap();
        assert_eq!(style.config_name("large"), "image.style.large");
        assert_eq!(style.id_key, "name");
        assert_eq!(settings.sync.path, Utf8PathBuf::from("config/sync"));
    }

    #[test]
    fn test_resolve_paths() {
        let mut settings = CfgsyncSettings::default();
        settings.sync.path = Utf8PathBuf::from("/abs/sync");
        settings.resolve_paths(Utf8Path::new("/project"));
        assert_eq!(settings.active.path, Utf8PathBuf::from("/project/config/active"));
        assert_eq!(settings.sync.path, Utf8PathBuf::from("/abs/sync"));
        assert_eq!(settings.state_dir, Utf8PathBuf::from("/project/.cfgsync"));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("DB".parse::<StorageBackendKind>(), Ok(StorageBackendKind::Database));
        assert!("s3".parse::<StorageBackendKind>().is_err());
    }
}
