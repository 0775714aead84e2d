//! Configuration import engine for cfgsync
//!
//! This crate handles:
//! - Comparing a source storage against a target storage
//! - Validating changelists (names, schemas, extensions, dependencies)
//! - Ordering import steps by dependency
//! - Applying steps one at a time under an import lock
//! - Single-item import of pasted documents
//! - Recording import runs in a JSON-lines ledger

pub mod comparer;
pub mod dependency;
pub mod error;
pub mod events;
pub mod importer;
pub mod ledger;
pub mod lifecycle;
pub mod lock;
pub mod manifest;
pub mod single;
pub mod step;
pub mod transform;
pub mod validator;

pub use comparer::{Changelist, ExtensionChangelist, Rename, StorageComparer};
pub use dependency::DependencyResolver;
pub use error::{ImportError, Result};
pub use events::{EventEnvelope, ImportEvent};
pub use importer::{ConfigImporter, ImportStatus, ImporterState};
pub use ledger::{ImportLedger, RunOutcome, RunSummary};
pub use lifecycle::{ExtensionInfo, ExtensionLifecycle};
pub use lock::{FileLockBackend, LockBackend, LockGuard, MemoryLockBackend};
pub use manifest::{ExtensionCatalog, ManifestLifecycle};
pub use single::{PreparedImport, SingleImport, SingleImportTarget};
pub use step::ImportStep;
pub use transform::{DocumentTransform, StripKeys, TransformPipeline};
pub use validator::{ImportCheck, ValidationContext, ValidationPipeline};
