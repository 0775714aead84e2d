//! Wiring of settings, storages and import collaborators for commands

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cfgsync_core::types::{CoreExtension, CORE_EXTENSION};
use cfgsync_core::{
    open_active_storage, open_sync_storage, CfgsyncSettings, HierarchicalConfigLoader,
    SchemaValidator, SharedStorage,
};
use cfgsync_import::{
    ConfigImporter, ExtensionCatalog, FileLockBackend, ImportLedger, LockBackend,
    ManifestLifecycle, StorageComparer, StripKeys, TransformPipeline,
};
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs, built from the resolved settings
pub struct Workspace {
    pub settings: CfgsyncSettings,
    pub active: SharedStorage,
    pub sync: SharedStorage,
}

impl Workspace {
    /// Load settings and open both storages
    pub fn load(config: Option<&Utf8Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        let cwd = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|p| anyhow::anyhow!("Working directory is not UTF-8: {}", p.display()))?;

        let settings = HierarchicalConfigLoader::new()
            .load(config, &cwd)
            .context("Failed to load cfgsync settings")?;
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: CfgsyncSettings) -> Result<Self> {
        let active = open_active_storage(&settings).context("Failed to open active storage")?;
        let sync = open_sync_storage(&settings);
        debug!("Active storage: {}, sync storage: {}", active.label(), sync.label());
        Ok(Self {
            settings,
            active,
            sync,
        })
    }

    /// Embedded schemas, or the configured schema directory
    pub fn schemas(&self) -> Result<Arc<SchemaValidator>> {
        let validator = match &self.settings.schema.dir {
            Some(dir) => SchemaValidator::from_directory(dir.as_std_path())
                .with_context(|| format!("Failed to load schemas from {}", dir))?,
            None => SchemaValidator::new().context("Failed to load embedded schemas")?,
        };
        Ok(Arc::new(validator.with_strict(self.settings.schema.strict)))
    }

    /// Extension lifecycle backed by the state directory manifest
    ///
    /// A missing manifest is seeded from the active `core.extension` so an
    /// existing site does not look like it has nothing installed.
    pub fn lifecycle(&self) -> Result<Arc<ManifestLifecycle>> {
        let catalog = self
            .settings
            .extensions
            .catalog
            .as_deref()
            .map(ExtensionCatalog::load)
            .transpose()?;
        let lifecycle = ManifestLifecycle::open(self.settings.manifest_path(), catalog)?;

        if self.active.exists(CORE_EXTENSION)? {
            let core = CoreExtension::from_document(&self.active.read(CORE_EXTENSION)?)?;
            lifecycle.seed_if_missing(&core)?;
        }
        Ok(Arc::new(lifecycle))
    }

    pub fn lock(&self) -> Arc<dyn LockBackend> {
        Arc::new(FileLockBackend::new(self.settings.state_dir.clone()))
    }

    pub fn ledger(&self) -> ImportLedger {
        ImportLedger::new(self.settings.ledger_path())
    }

    /// Comparer of the sync storage against the active storage
    pub fn comparer(&self) -> StorageComparer {
        let mut transforms = TransformPipeline::new();
        if !self.settings.import.strip_keys.is_empty() {
            transforms.register(Box::new(StripKeys::new(
                self.settings.import.strip_keys.iter().cloned(),
            )));
        }
        StorageComparer::new(self.sync.clone(), self.active.clone()).with_transforms(transforms)
    }

    /// Fully wired importer of the sync storage into the active storage
    pub fn importer(&self) -> Result<ConfigImporter> {
        let importer = self.configure(ConfigImporter::new(self.comparer(), self.lock()))?;
        Ok(importer
            .with_lifecycle(self.lifecycle()?)
            .with_ledger(self.ledger()))
    }

    /// Attach the lock key and schemas to an importer
    pub fn configure(&self, importer: ConfigImporter) -> Result<ConfigImporter> {
        Ok(importer
            .with_lock_key(self.settings.import.lock_key.clone())
            .with_schemas(self.schemas()?))
    }
}
