//! Settings loading and storage construction

mod hierarchical_loader;

pub use hierarchical_loader::HierarchicalConfigLoader;

use crate::error::Result;
use crate::storage::{CachedStorage, DatabaseStorage, FileStorage, SharedStorage};
use crate::types::{CfgsyncSettings, StorageBackendKind};
use std::sync::Arc;

/// Open the active storage described by the settings
///
/// The database is held open exclusively by this process, so its reads are
/// cached. Files may be edited by anyone and are always read through.
pub fn open_active_storage(settings: &CfgsyncSettings) -> Result<SharedStorage> {
    let storage: SharedStorage = match settings.active.backend {
        StorageBackendKind::File => Arc::new(FileStorage::new(settings.active.path.clone())),
        StorageBackendKind::Database => {
            let database: SharedStorage = Arc::new(DatabaseStorage::open(&settings.active.path)?);
            Arc::new(CachedStorage::new(database))
        }
    };
    Ok(storage)
}

/// Open the sync storage described by the settings
pub fn open_sync_storage(settings: &CfgsyncSettings) -> SharedStorage {
    Arc::new(FileStorage::new(settings.sync.path.clone()))
}
