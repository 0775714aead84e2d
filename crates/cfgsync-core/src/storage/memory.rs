use super::ConfigStorage;
use crate::error::{Error, Result};
use crate::names::validate_name;
use crate::types::ConfigDocument;
use serde_yaml_ng::Mapping;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// In-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: RwLock<BTreeMap<String, Mapping>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage pre-filled with documents
    pub fn with_documents(docs: impl IntoIterator<Item = ConfigDocument>) -> Self {
        let documents = docs
            .into_iter()
            .map(|doc| (doc.name().to_string(), doc.into_data()))
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfigStorage for MemoryStorage {
    fn label(&self) -> String {
        "memory".to_string()
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.contains_key(name))
    }

    fn read(&self, name: &str) -> Result<ConfigDocument> {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        docs.get(name)
            .map(|data| ConfigDocument::new(name, data.clone()))
            .ok_or_else(|| Error::not_found(name))
    }

    fn write(&self, name: &str, data: &Mapping) -> Result<()> {
        validate_name(name)?;
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        docs.insert(name.to_string(), data.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        docs.remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(name))
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud() {
        let storage = MemoryStorage::new();
        let data = ConfigDocument::from_yaml("system.site", "name: Foo").unwrap();

        assert!(!storage.exists("system.site").unwrap());
        storage.write("system.site", data.data()).unwrap();
        assert!(storage.exists("system.site").unwrap());
        assert_eq!(storage.read("system.site").unwrap(), data);

        storage.delete("system.site").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_missing_document() {
        let storage = MemoryStorage::new();
        assert!(storage.read("system.site").unwrap_err().is_not_found());
        assert!(storage.delete("system.site").unwrap_err().is_not_found());
    }

    #[test]
    fn test_write_rejects_invalid_name() {
        let storage = MemoryStorage::new();
        let err = storage.write("nodot", &Mapping::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));
    }

    #[test]
    fn test_list_all_sorted_with_prefix() {
        let storage = MemoryStorage::new();
        for name in ["b.two", "a.one", "b.one"] {
            storage.write(name, &Mapping::new()).unwrap();
        }
        assert_eq!(storage.list_all("").unwrap(), vec!["a.one", "b.one", "b.two"]);
        assert_eq!(storage.list_all("b.").unwrap(), vec!["b.one", "b.two"]);
    }
}
