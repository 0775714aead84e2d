use super::{ConfigStorage, SharedStorage};
use crate::error::{Error, Result};
use crate::types::ConfigDocument;
use serde_yaml_ng::Mapping;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Read-only view of another storage with some documents replaced
///
/// Used to stage a single pasted document on top of the active storage so
/// the regular comparer and importer can process it.
pub struct ReplaceDataStorage {
    inner: SharedStorage,
    replacements: RwLock<BTreeMap<String, Mapping>>,
}

impl ReplaceDataStorage {
    pub fn new(inner: SharedStorage) -> Self {
        Self {
            inner,
            replacements: RwLock::new(BTreeMap::new()),
        }
    }

    /// Replace (or add) the data of one document in this view
    pub fn replace_data(&self, name: &str, data: Mapping) -> Result<()> {
        crate::names::validate_name(name)?;
        self.replacements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), data);
        Ok(())
    }
}

impl ConfigStorage for ReplaceDataStorage {
    fn label(&self) -> String {
        format!("replace({})", self.inner.label())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        if self
            .replacements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
        {
            return Ok(true);
        }
        self.inner.exists(name)
    }

    fn read(&self, name: &str) -> Result<ConfigDocument> {
        if let Some(data) = self
            .replacements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(ConfigDocument::new(name, data.clone()));
        }
        self.inner.read(name)
    }

    fn write(&self, _name: &str, _data: &Mapping) -> Result<()> {
        Err(Error::read_only(self.label()))
    }

    fn delete(&self, _name: &str) -> Result<()> {
        Err(Error::read_only(self.label()))
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = self.inner.list_all(prefix)?;
        let replacements = self
            .replacements
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for name in replacements.keys().filter(|n| n.starts_with(prefix)) {
            if let Err(pos) = names.binary_search(name) {
                names.insert(pos, name.clone());
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn data(yaml: &str) -> Mapping {
        ConfigDocument::from_yaml("t.t", yaml).unwrap().into_data()
    }

    #[test]
    fn test_overlay() {
        let inner = Arc::new(MemoryStorage::new());
        inner.write("system.site", &data("name: Foo")).unwrap();
        inner.write("system.menu", &data("depth: 1")).unwrap();

        let overlay = ReplaceDataStorage::new(inner.clone());
        overlay.replace_data("system.site", data("name: Bar")).unwrap();
        overlay.replace_data("image.style.large", data("label: Large")).unwrap();

        assert_eq!(overlay.read("system.site").unwrap().data(), &data("name: Bar"));
        assert_eq!(overlay.read("system.menu").unwrap().data(), &data("depth: 1"));
        assert!(overlay.exists("image.style.large").unwrap());
        assert_eq!(
            overlay.list_all("").unwrap(),
            vec!["image.style.large", "system.menu", "system.site"]
        );

        // The wrapped storage is untouched.
        assert_eq!(inner.read("system.site").unwrap().data(), &data("name: Foo"));
    }

    #[test]
    fn test_read_only() {
        let overlay = ReplaceDataStorage::new(Arc::new(MemoryStorage::new()));
        assert!(matches!(
            overlay.write("system.site", &Mapping::new()),
            Err(Error::ReadOnly { .. })
        ));
        assert!(matches!(overlay.delete("system.site"), Err(Error::ReadOnly { .. })));
    }
}
