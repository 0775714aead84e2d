//! # cfgsync-core
//!
//! Core library for cfgsync providing:
//! - Configuration documents and naming rules
//! - Storage backends (memory, file, database) and decorators
//! - JSON Schema validation of documents
//! - Layered settings loading (cfgsync.yaml)

pub mod config;
pub mod error;
pub mod names;
pub mod schema;
pub mod storage;
pub mod types;
pub mod utils;

pub use config::{open_active_storage, open_sync_storage, HierarchicalConfigLoader};
pub use error::{Error, Result};
pub use schema::SchemaValidator;
pub use storage::{
    copy_all, CachedStorage, ConfigStorage, DatabaseStorage, FileStorage, MemoryStorage,
    ReplaceDataStorage, SharedStorage,
};
pub use types::{CfgsyncSettings, ConfigDocument};
pub use utils::get_home_dir;
