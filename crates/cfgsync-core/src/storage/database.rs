use super::ConfigStorage;
use crate::error::{Error, Result};
use crate::names::validate_name;
use crate::types::ConfigDocument;
use camino::Utf8Path;
use serde_yaml_ng::Mapping;
use tracing::debug;

/// Tree holding configuration documents
const CONFIG_TREE: &str = "config";

/// Storage backed by an embedded sled database
///
/// Documents are stored as YAML text keyed by name, so the same codec is
/// used as for file storage.
pub struct DatabaseStorage {
    label: String,
    tree: sled::Tree,
}

impl DatabaseStorage {
    /// Open (or create) a database at `path`
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(CONFIG_TREE)?;
        debug!("Opened config database at {}", path);
        Ok(Self {
            label: format!("database:{}", path),
            tree,
        })
    }

    /// Open a throwaway database that is removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree(CONFIG_TREE)?;
        Ok(Self {
            label: "database:temporary".to_string(),
            tree,
        })
    }
}

impl ConfigStorage for DatabaseStorage {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.tree.contains_key(name)?)
    }

    fn read(&self, name: &str) -> Result<ConfigDocument> {
        let value = self.tree.get(name)?.ok_or_else(|| Error::not_found(name))?;
        let content = std::str::from_utf8(&value)
            .map_err(|_| Error::invalid_data(name, "stored value is not valid UTF-8"))?;
        ConfigDocument::from_yaml(name, content)
    }

    fn write(&self, name: &str, data: &Mapping) -> Result<()> {
        validate_name(name)?;
        let content = serde_yaml_ng::to_string(data)?;
        self.tree
            .insert(name, content.into_bytes())
            .map_err(|e| Error::write(name, e.to_string()))?;
        self.tree
            .flush()
            .map_err(|e| Error::write(name, e.to_string()))?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let removed = self
            .tree
            .remove(name)
            .map_err(|e| Error::write(name, e.to_string()))?;
        if removed.is_none() {
            return Err(Error::not_found(name));
        }
        self.tree
            .flush()
            .map_err(|e| Error::write(name, e.to_string()))?;
        Ok(())
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.tree.scan_prefix(prefix) {
            let (key, _) = entry?;
            let name = String::from_utf8(key.to_vec())
                .map_err(|_| Error::invalid_name("<binary>", "stored key is not valid UTF-8"))?;
            names.push(name);
        }
        Ok(names)
    }
}
