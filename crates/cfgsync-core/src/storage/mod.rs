//! Configuration storages
//!
//! A storage is a flat key/value store of named configuration documents.
//! Every operation is atomic for a single name; there is no multi-name
//! transaction at this layer.
//!
//! Backends:
//! - [`MemoryStorage`] keeps documents in a map
//! - [`FileStorage`] keeps one YAML file per document
//! - [`DatabaseStorage`] keeps YAML values in an embedded sled tree
//!
//! Decorators:
//! - [`CachedStorage`] caches reads and invalidates on write/delete/rename
//! - [`ReplaceDataStorage`] overlays replacement data on another storage

mod cached;
mod database;
mod file;
mod memory;
mod replace;

pub use cached::CachedStorage;
pub use database::DatabaseStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use replace::ReplaceDataStorage;

use crate::error::Result;
use crate::types::ConfigDocument;
use serde_yaml_ng::Mapping;
use std::sync::Arc;
use tracing::debug;

/// Shared handle to any storage backend
pub type SharedStorage = Arc<dyn ConfigStorage>;

/// Contract every storage backend implements
pub trait ConfigStorage: Send + Sync {
    /// Short description used in logs and errors
    fn label(&self) -> String;

    /// Check whether a document exists
    fn exists(&self, name: &str) -> Result<bool>;

    /// Read a document, failing with `Error::NotFound` when it is absent
    fn read(&self, name: &str) -> Result<ConfigDocument>;

    /// Replace a document's data in full
    fn write(&self, name: &str, data: &Mapping) -> Result<()>;

    /// Delete a document, failing with `Error::NotFound` when it is absent
    fn delete(&self, name: &str) -> Result<()>;

    /// List document names starting with `prefix`, sorted
    fn list_all(&self, prefix: &str) -> Result<Vec<String>>;

    /// Read every existing document among `names`, skipping missing ones
    fn read_multiple(&self, names: &[String]) -> Result<Vec<ConfigDocument>> {
        let mut docs = Vec::with_capacity(names.len());
        for name in names {
            match self.read(name) {
                Ok(doc) => docs.push(doc),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(docs)
    }

    /// Move a document to a new name
    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let doc = self.read(from)?;
        self.write(to, doc.data())?;
        self.delete(from)
    }

    /// Delete every document starting with `prefix`, returning the count
    fn delete_all(&self, prefix: &str) -> Result<usize> {
        let names = self.list_all(prefix)?;
        for name in &names {
            self.delete(name)?;
        }
        Ok(names.len())
    }
}

/// Replace the content of `target` with the content of `source`
///
/// Documents missing from `source` are deleted from `target`. Returns the
/// number of documents copied.
pub fn copy_all(source: &dyn ConfigStorage, target: &dyn ConfigStorage) -> Result<usize> {
    let names = source.list_all("")?;

    for stale in target.list_all("")? {
        if names.binary_search(&stale).is_err() {
            debug!("Removing {} from {}", stale, target.label());
            target.delete(&stale)?;
        }
    }

    for name in &names {
        let doc = source.read(name)?;
        target.write(name, doc.data())?;
    }

    debug!(
        "Copied {} documents from {} to {}",
        names.len(),
        source.label(),
        target.label()
    );
    Ok(names.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Mapping {
        ConfigDocument::from_yaml("t.t", yaml).unwrap().into_data()
    }

    #[test]
    fn test_copy_all_replaces_target() {
        let source = MemoryStorage::new();
        source.write("system.site", &doc("name: Foo")).unwrap();
        source.write("system.menu", &doc("depth: 2")).unwrap();

        let target = MemoryStorage::new();
        target.write("system.site", &doc("name: Old")).unwrap();
        target.write("old.thing", &doc("x: 1")).unwrap();

        let copied = copy_all(&source, &target).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(target.list_all("").unwrap(), vec!["system.menu", "system.site"]);
        assert_eq!(target.read("system.site").unwrap().data(), &doc("name: Foo"));
    }

    #[test]
    fn test_default_rename_and_read_multiple() {
        let storage = MemoryStorage::new();
        storage.write("a.one", &doc("v: 1")).unwrap();
        storage.rename("a.one", "a.two").unwrap();
        assert!(!storage.exists("a.one").unwrap());

        let docs = storage
            .read_multiple(&["a.one".to_string(), "a.two".to_string()])
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name(), "a.two");
    }

    #[test]
    fn test_delete_all_with_prefix() {
        let storage = MemoryStorage::new();
        storage.write("image.style.large", &doc("v: 1")).unwrap();
        storage.write("image.style.small", &doc("v: 1")).unwrap();
        storage.write("system.site", &doc("v: 1")).unwrap();
        assert_eq!(storage.delete_all("image.style.").unwrap(), 2);
        assert_eq!(storage.list_all("").unwrap(), vec!["system.site"]);
    }
}
