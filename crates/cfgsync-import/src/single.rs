//! Single-item import
//!
//! Stages one pasted YAML document on top of the active storage and
//! prepares a regular [`ConfigImporter`] for it. Entity imports are checked
//! against existing entities of the same type before anything is compared.

use crate::comparer::StorageComparer;
use crate::error::{ImportError, Result};
use crate::importer::ConfigImporter;
use crate::lock::LockBackend;
use cfgsync_core::types::EntityTypeDefinition;
use cfgsync_core::{ReplaceDataStorage, SharedStorage};
use serde_yaml_ng::{Mapping, Value};
use std::sync::Arc;
use tracing::debug;

/// What the pasted document is
#[derive(Debug, Clone)]
pub enum SingleImportTarget {
    /// Simple configuration stored under an explicit name
    Simple { name: String },
    /// Config entity; the name is derived from the entity id
    Entity {
        entity_type: EntityTypeDefinition,
        /// Replaces the id found in the document
        custom_id: Option<String>,
    },
}

/// A single document ready to be imported
pub struct PreparedImport {
    name: String,
    exists: bool,
    comparer: StorageComparer,
}

impl std::fmt::Debug for PreparedImport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedImport")
            .field("name", &self.name)
            .field("exists", &self.exists)
            .finish_non_exhaustive()
    }
}

impl PreparedImport {
    /// Config name the document will be written to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the import replaces an existing document
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Calculated comparison of the staged overlay against the active storage
    pub fn comparer(&self) -> &StorageComparer {
        &self.comparer
    }

    /// Importer writing the document into the active storage
    pub fn into_importer(self, lock: Arc<dyn LockBackend>) -> ConfigImporter {
        ConfigImporter::new(self.comparer, lock)
    }
}

/// Prepares imports of one document into the active storage
pub struct SingleImport {
    active: SharedStorage,
}

impl SingleImport {
    pub fn new(active: SharedStorage) -> Self {
        Self { active }
    }

    /// Check a pasted document and stage it for import
    ///
    /// Failures are returned as [`ImportError::Validation`] holding one
    /// message.
    pub fn prepare(&self, target: &SingleImportTarget, yaml: &str) -> Result<PreparedImport> {
        let mut data = parse(yaml)?;

        let (name, exists) = match target {
            SingleImportTarget::Simple { name } => {
                let exists = self.active.exists(name)?;
                (name.clone(), exists)
            }
            SingleImportTarget::Entity {
                entity_type,
                custom_id,
            } => self.check_entity(entity_type, custom_id.as_deref(), &mut data)?,
        };

        let overlay = ReplaceDataStorage::new(self.active.clone());
        overlay
            .replace_data(&name, data)
            .map_err(|e| ImportError::validation(vec![e.to_string()]))?;

        let mut comparer = StorageComparer::new(Arc::new(overlay), self.active.clone());
        if !comparer.create_changelist()?.has_changes() {
            return Err(ImportError::validation(vec![
                "There are no changes to import.".to_string(),
            ]));
        }

        debug!("Prepared single import of {} (exists: {})", name, exists);
        Ok(PreparedImport {
            name,
            exists,
            comparer,
        })
    }

    fn check_entity(
        &self,
        entity_type: &EntityTypeDefinition,
        custom_id: Option<&str>,
        data: &mut Mapping,
    ) -> Result<(String, bool)> {
        let id_key = entity_type.id_key.as_str();
        if let Some(id) = custom_id.filter(|id| !id.is_empty()) {
            data.insert(Value::from(id_key), Value::from(id));
        }

        let Some(id) = data.get(id_key).and_then(scalar_string) else {
            return Err(single_error(format!(
                "Missing ID key \"{}\" for this {} import.",
                id_key, entity_type.label
            )));
        };
        let uuid = data.get("uuid").and_then(scalar_string);
        let name = entity_type.config_name(&id);

        if self.active.exists(&name)? {
            let existing = self.active.read(&name)?;
            let Some(uuid) = uuid else {
                return Err(single_error(
                    "An entity with this machine name already exists but the import did not specify a UUID.",
                ));
            };
            if existing.uuid() != Some(uuid.as_str()) {
                return Err(single_error(
                    "An entity with this machine name already exists but the UUID does not match.",
                ));
            }
            return Ok((name, true));
        }

        if let Some(uuid) = uuid {
            let prefix = format!("{}.", entity_type.config_prefix);
            for other in self.active.list_all(&prefix)? {
                if self.active.read(&other)?.uuid() == Some(uuid.as_str()) {
                    return Err(single_error(
                        "An entity with this UUID already exists but the machine name does not match.",
                    ));
                }
            }
        }

        Ok((name, false))
    }
}

fn parse(yaml: &str) -> Result<Mapping> {
    let value: Value =
        serde_yaml_ng::from_str(yaml).map_err(|e| import_failed(&e.to_string()))?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(import_failed(&format!(
            "expected a mapping, found {}",
            cfgsync_core::types::value_kind(&other)
        ))),
    }
}

fn import_failed(message: &str) -> ImportError {
    single_error(format!(
        "The import failed with the following message: {}",
        message
    ))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn single_error(message: impl Into<String>) -> ImportError {
    ImportError::validation(vec![message.into()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgsync_core::{ConfigDocument, ConfigStorage, MemoryStorage};

    fn active() -> SharedStorage {
        let storage = MemoryStorage::new();
        let doc = ConfigDocument::from_yaml(
            "image.style.large",
            "uuid: '1111'\nid: large\nlabel: Large\n",
        )
        .unwrap();
        storage.write(doc.name(), doc.data()).unwrap();
        Arc::new(storage)
    }

    fn image_style() -> EntityTypeDefinition {
        EntityTypeDefinition {
            id: "image_style".into(),
            label: "Image style".into(),
            config_prefix: "image.style".into(),
            id_key: "id".into(),
        }
    }

    fn message(err: ImportError) -> String {
        err.messages().join("\n")
    }

    #[test]
    fn test_invalid_yaml() {
        let single = SingleImport::new(active());
        let target = SingleImportTarget::Simple {
            name: "system.site".into(),
        };
        let err = single.prepare(&target, "a: [unclosed").unwrap_err();
        assert!(message(err).starts_with("The import failed with the following message:"));
    }

    #[test]
    fn test_custom_id_overrides_document() {
        let single = SingleImport::new(active());
        let target = SingleImportTarget::Entity {
            entity_type: image_style(),
            custom_id: Some("thumb".into()),
        };
        let prepared = single
            .prepare(&target, "uuid: '2222'\nid: large\nlabel: Thumb\n")
            .unwrap();
        assert_eq!(prepared.name(), "image.style.thumb");
        assert!(!prepared.exists());
        assert_eq!(prepared.comparer().changelist().create, vec!["image.style.thumb"]);
    }

    #[test]
    fn test_uuid_used_by_other_entity() {
        let single = SingleImport::new(active());
        let target = SingleImportTarget::Entity {
            entity_type: image_style(),
            custom_id: None,
        };
        let err = single
            .prepare(&target, "uuid: '1111'\nid: medium\n")
            .unwrap_err();
        assert_eq!(
            message(err),
            "An entity with this UUID already exists but the machine name does not match."
        );
    }
}
