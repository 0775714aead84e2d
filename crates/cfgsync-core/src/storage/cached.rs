use super::{ConfigStorage, SharedStorage};
use crate::error::{Error, Result};
use crate::types::ConfigDocument;
use serde_yaml_ng::Mapping;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Read-through cache over another storage
///
/// Both hits and misses are cached. `write`, `delete` and `rename` drop the
/// affected entries before and after touching the inner storage, so a read
/// racing the mutation cannot leave the old value cached. Listings always go
/// to the inner storage.
pub struct CachedStorage {
    inner: SharedStorage,
    cache: RwLock<HashMap<String, Option<Mapping>>>,
}

impl CachedStorage {
    pub fn new(inner: SharedStorage) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached entry
    pub fn reset(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached entries (hits and misses)
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn invalidate(&self, name: &str) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    fn lookup(&self, name: &str) -> Result<Option<Mapping>> {
        if let Some(entry) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(entry.clone());
        }

        let loaded = match self.inner.read(name) {
            Ok(doc) => Some(doc.into_data()),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }
}

impl ConfigStorage for CachedStorage {
    fn label(&self) -> String {
        format!("cached({})", self.inner.label())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.lookup(name)?.is_some())
    }

    fn read(&self, name: &str) -> Result<ConfigDocument> {
        self.lookup(name)?
            .map(|data| ConfigDocument::new(name, data))
            .ok_or_else(|| Error::not_found(name))
    }

    fn write(&self, name: &str, data: &Mapping) -> Result<()> {
        self.invalidate(name);
        let result = self.inner.write(name, data);
        self.invalidate(name);
        result
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.invalidate(name);
        let result = self.inner.delete(name);
        self.invalidate(name);
        result
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.invalidate(from);
        self.invalidate(to);
        let result = self.inner.rename(from, to);
        self.invalidate(from);
        self.invalidate(to);
        result
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_all(prefix)
    }
}
