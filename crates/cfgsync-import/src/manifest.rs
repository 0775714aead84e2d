//! Manifest-backed extension lifecycle
//!
//! Installed extensions are tracked in a manifest file in the state
//! directory (`<state-dir>/extensions.yaml`). The extensions that may be
//! installed come from an optional catalog file:
//!
//! ```yaml
//! module:
//!   node:
//!     label: Node
//!     dependencies: [text, user]
//!   system:
//!     required: true
//! theme:
//!   olivero:
//!     base-theme: stable
//! ```
//!
//! Without a catalog every extension is accepted and has no dependencies.

use crate::lifecycle::{ExtensionInfo, ExtensionLifecycle};
use anyhow::{anyhow, bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cfgsync_core::types::{CoreExtension, ExtensionKind, ExtensionRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Catalog entry of an available extension
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogEntry {
    #[serde(default)]
    pub label: Option<String>,

    /// Modules this extension requires
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Theme this theme extends
    #[serde(default)]
    pub base_theme: Option<String>,

    #[serde(default)]
    pub required: bool,
}

/// Available extensions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionCatalog {
    #[serde(default)]
    pub module: BTreeMap<String, CatalogEntry>,

    #[serde(default)]
    pub theme: BTreeMap<String, CatalogEntry>,
}

impl ExtensionCatalog {
    /// Load a catalog from a YAML file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read extension catalog {}", path))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse extension catalog {}", path))
    }

    pub fn info(&self, ext: &ExtensionRef) -> Option<ExtensionInfo> {
        let entries = match ext.kind {
            ExtensionKind::Module => &self.module,
            ExtensionKind::Theme => &self.theme,
        };
        entries.get(&ext.name).map(|entry| {
            let mut dependencies: Vec<ExtensionRef> = entry
                .dependencies
                .iter()
                .map(ExtensionRef::module)
                .collect();
            if let Some(base) = &entry.base_theme {
                dependencies.push(ExtensionRef::theme(base));
            }
            ExtensionInfo {
                extension: ext.clone(),
                label: entry.label.clone(),
                dependencies,
                required: entry.required,
            }
        })
    }
}

/// Record of one installed extension
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstalledExtension {
    pub installed_at: DateTime<Utc>,
}

/// On-disk manifest of installed extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstallManifest {
    pub schema_version: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub module: BTreeMap<String, InstalledExtension>,
    #[serde(default)]
    pub theme: BTreeMap<String, InstalledExtension>,
}

impl Default for InstallManifest {
    fn default() -> Self {
        Self {
            schema_version: "1.0".to_string(),
            last_updated: Utc::now(),
            module: BTreeMap::new(),
            theme: BTreeMap::new(),
        }
    }
}

impl InstallManifest {
    fn entries_mut(&mut self, kind: ExtensionKind) -> &mut BTreeMap<String, InstalledExtension> {
        match kind {
            ExtensionKind::Module => &mut self.module,
            ExtensionKind::Theme => &mut self.theme,
        }
    }

    fn extensions(&self) -> BTreeSet<ExtensionRef> {
        self.module
            .keys()
            .map(ExtensionRef::module)
            .chain(self.theme.keys().map(ExtensionRef::theme))
            .collect()
    }
}

/// Extension lifecycle persisting installs to a manifest file
pub struct ManifestLifecycle {
    /// Path to manifest file
    manifest_path: Utf8PathBuf,

    catalog: Option<ExtensionCatalog>,

    /// Current manifest data
    manifest: Mutex<InstallManifest>,
}

impl ManifestLifecycle {
    /// Open the manifest at `manifest_path`
    ///
    /// A missing manifest starts out empty and is written on the first
    /// change.
    pub fn open(manifest_path: impl Into<Utf8PathBuf>, catalog: Option<ExtensionCatalog>) -> Result<Self> {
        let manifest_path = manifest_path.into();
        debug!("Loading extension manifest from: {}", manifest_path);

        let manifest = if manifest_path.exists() {
            Self::load_manifest(&manifest_path)?
        } else {
            InstallManifest::default()
        };

        Ok(Self {
            manifest_path,
            catalog,
            manifest: Mutex::new(manifest),
        })
    }

    pub fn manifest_path(&self) -> &Utf8Path {
        &self.manifest_path
    }

    /// Record the extensions of an existing site when no manifest exists yet
    ///
    /// Returns true if the manifest was created.
    pub fn seed_if_missing(&self, core: &CoreExtension) -> Result<bool> {
        if self.manifest_path.exists() {
            return Ok(false);
        }
        let mut manifest = self.lock();
        let now = Utc::now();
        for ext in core.extensions() {
            manifest
                .entries_mut(ext.kind)
                .insert(ext.name, InstalledExtension { installed_at: now });
        }
        info!(
            "Seeded extension manifest {} with {} extensions",
            self.manifest_path,
            manifest.module.len() + manifest.theme.len()
        );
        self.save(&mut manifest)?;
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InstallManifest> {
        self.manifest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_manifest(path: &Utf8Path) -> Result<InstallManifest> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path))?;
        let manifest: InstallManifest = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path))?;
        debug!(
            "Loaded manifest with {} modules and {} themes",
            manifest.module.len(),
            manifest.theme.len()
        );
        Ok(manifest)
    }

    fn save(&self, manifest: &mut InstallManifest) -> Result<()> {
        manifest.last_updated = Utc::now();
        if let Some(parent) = self.manifest_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent))?;
        }
        let content = serde_yaml_ng::to_string(&*manifest)?;
        std::fs::write(&self.manifest_path, content)
            .with_context(|| format!("Failed to write manifest {}", self.manifest_path))?;
        Ok(())
    }
}

impl ExtensionLifecycle for ManifestLifecycle {
    fn install(&self, kind: ExtensionKind, names: &[String]) -> Result<()> {
        let mut manifest = self.lock();
        for name in names {
            let ext = ExtensionRef {
                kind,
                name: name.clone(),
            };
            if self.info(&ext)?.is_none() {
                bail!("The {} is not available in the extension catalog", ext);
            }
            info!("Installing {}", ext);
            manifest.entries_mut(kind).insert(
                name.clone(),
                InstalledExtension {
                    installed_at: Utc::now(),
                },
            );
        }
        self.save(&mut manifest)
    }

    fn uninstall(&self, kind: ExtensionKind, names: &[String]) -> Result<()> {
        let mut manifest = self.lock();
        for name in names {
            if manifest.entries_mut(kind).remove(name).is_none() {
                return Err(anyhow!("The {} {} is not installed", kind, name));
            }
            info!("Uninstalled {} {}", kind, name);
        }
        self.save(&mut manifest)
    }

    fn list_installed(&self) -> Result<BTreeSet<ExtensionRef>> {
        Ok(self.lock().extensions())
    }

    fn info(&self, extension: &ExtensionRef) -> Result<Option<ExtensionInfo>> {
        Ok(match &self.catalog {
            Some(catalog) => catalog.info(extension),
            None => Some(ExtensionInfo::new(extension.clone())),
        })
    }
}
