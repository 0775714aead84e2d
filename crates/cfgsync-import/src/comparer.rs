//! Storage comparison
//!
//! The comparer takes a snapshot of a source (sync) and a target (active)
//! storage and derives the changelist that would make the target equal to
//! the source. Content is compared structurally, so formatting and key
//! order never register as changes.

use crate::error::{ImportError, Result};
use crate::lifecycle::ExtensionLifecycle;
use crate::transform::TransformPipeline;
use cfgsync_core::types::{CoreExtension, ExtensionRef, CORE_EXTENSION};
use cfgsync_core::{ConfigDocument, SharedStorage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// A document moved to a new name, identified by its uuid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
    /// True when the content differs besides the name
    pub content_changed: bool,
}

/// The four disjoint sets of pending changes, each sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changelist {
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
    pub rename: Vec<Rename>,
}

impl Changelist {
    pub fn has_changes(&self) -> bool {
        !(self.create.is_empty()
            && self.update.is_empty()
            && self.delete.is_empty()
            && self.rename.is_empty())
    }

    /// Total number of operations
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len() + self.rename.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_changes()
    }

    /// Names whose source content will be written: creates, updates and
    /// rename targets
    pub fn written_names(&self) -> impl Iterator<Item = &str> {
        self.create
            .iter()
            .chain(self.update.iter())
            .map(String::as_str)
            .chain(self.rename.iter().map(|r| r.to.as_str()))
    }
}

/// Modules and themes to install or uninstall
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionChangelist {
    pub install: Vec<ExtensionRef>,
    pub uninstall: Vec<ExtensionRef>,
}

impl ExtensionChangelist {
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.uninstall.is_empty()
    }
}

/// Decoded and transformed documents of one storage at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
struct Snapshot {
    documents: BTreeMap<String, ConfigDocument>,
}

impl Snapshot {
    fn load(storage: &SharedStorage, transforms: Option<&TransformPipeline>) -> Result<Self> {
        let names = storage.list_all("")?;
        let mut documents = BTreeMap::new();
        for doc in storage.read_multiple(&names)? {
            let doc = match transforms {
                Some(pipeline) => match pipeline.apply(doc) {
                    Some(doc) => doc,
                    None => continue,
                },
                None => doc,
            };
            documents.insert(doc.name().to_string(), doc);
        }
        Ok(Self { documents })
    }
}

/// Compares a source storage with a target storage
pub struct StorageComparer {
    source: SharedStorage,
    target: SharedStorage,
    transforms: TransformPipeline,
    source_snapshot: Snapshot,
    target_snapshot: Snapshot,
    changelist: Changelist,
    calculated: bool,
}

impl StorageComparer {
    pub fn new(source: SharedStorage, target: SharedStorage) -> Self {
        Self {
            source,
            target,
            transforms: TransformPipeline::new(),
            source_snapshot: Snapshot::default(),
            target_snapshot: Snapshot::default(),
            changelist: Changelist::default(),
            calculated: false,
        }
    }

    /// Transforms applied to source documents before comparison
    pub fn with_transforms(mut self, transforms: TransformPipeline) -> Self {
        self.transforms = transforms;
        self.calculated = false;
        self
    }

    pub fn source(&self) -> &SharedStorage {
        &self.source
    }

    pub fn target(&self) -> &SharedStorage {
        &self.target
    }

    /// Whether a changelist has been computed since the last invalidation
    pub fn is_calculated(&self) -> bool {
        self.calculated
    }

    /// Mark the current snapshot as unusable
    pub fn invalidate(&mut self) {
        self.calculated = false;
    }

    /// Snapshot both storages and compute the changelist
    pub fn create_changelist(&mut self) -> Result<&Changelist> {
        self.source_snapshot = Snapshot::load(&self.source, Some(&self.transforms))?;
        self.target_snapshot = Snapshot::load(&self.target, None)?;
        self.changelist = diff(&self.source_snapshot, &self.target_snapshot);
        self.calculated = true;

        info!(
            "Compared {} with {}: {} create, {} update, {} delete, {} rename",
            self.source.label(),
            self.target.label(),
            self.changelist.create.len(),
            self.changelist.update.len(),
            self.changelist.delete.len(),
            self.changelist.rename.len()
        );
        Ok(&self.changelist)
    }

    /// Recompute the changelist from the current storage contents
    pub fn reset(&mut self) -> Result<&Changelist> {
        self.create_changelist()
    }

    /// The changelist of the current snapshot
    pub fn changelist(&self) -> &Changelist {
        &self.changelist
    }

    pub fn has_changes(&self) -> bool {
        self.changelist.has_changes()
    }

    /// True if either storage no longer matches the snapshot
    pub fn is_stale(&self) -> Result<bool> {
        if !self.calculated {
            return Ok(true);
        }
        let source = Snapshot::load(&self.source, Some(&self.transforms))?;
        if source != self.source_snapshot {
            debug!("Source storage {} changed since comparison", self.source.label());
            return Ok(true);
        }
        let target = Snapshot::load(&self.target, None)?;
        if target != self.target_snapshot {
            debug!("Target storage {} changed since comparison", self.target.label());
            return Ok(true);
        }
        Ok(false)
    }

    /// A source document as it was snapshotted (after transforms)
    pub fn source_document(&self, name: &str) -> Option<&ConfigDocument> {
        self.source_snapshot.documents.get(name)
    }

    /// A target document as it was snapshotted
    pub fn target_document(&self, name: &str) -> Option<&ConfigDocument> {
        self.target_snapshot.documents.get(name)
    }

    pub fn source_documents(&self) -> impl Iterator<Item = &ConfigDocument> {
        self.source_snapshot.documents.values()
    }

    pub fn target_documents(&self) -> impl Iterator<Item = &ConfigDocument> {
        self.target_snapshot.documents.values()
    }

    /// Decoded `core.extension` of the source, if it has one
    pub fn source_extensions(&self) -> Result<Option<CoreExtension>> {
        self.source_document(CORE_EXTENSION)
            .map(CoreExtension::from_document)
            .transpose()
            .map_err(ImportError::from)
    }

    /// Decoded `core.extension` of the target, if it has one
    pub fn target_extensions(&self) -> Result<Option<CoreExtension>> {
        self.target_document(CORE_EXTENSION)
            .map(CoreExtension::from_document)
            .transpose()
            .map_err(ImportError::from)
    }

    /// Modules and themes to install or uninstall
    ///
    /// Computed from the source `core.extension` against what the lifecycle
    /// reports as installed. Without a source `core.extension` extensions
    /// are left alone.
    pub fn extension_changelist(
        &self,
        lifecycle: &dyn ExtensionLifecycle,
    ) -> Result<ExtensionChangelist> {
        let Some(wanted) = self.source_extensions()? else {
            return Ok(ExtensionChangelist::default());
        };
        let wanted: BTreeSet<ExtensionRef> = wanted.extensions().into_iter().collect();
        let installed = lifecycle.list_installed().map_err(ImportError::lifecycle)?;

        let changes = ExtensionChangelist {
            install: wanted.difference(&installed).cloned().collect(),
            uninstall: installed.difference(&wanted).cloned().collect(),
        };
        debug!(
            "Extension changes: {} install, {} uninstall",
            changes.install.len(),
            changes.uninstall.len()
        );
        Ok(changes)
    }
}

fn diff(source: &Snapshot, target: &Snapshot) -> Changelist {
    let mut changelist = Changelist::default();

    let source_only: Vec<&ConfigDocument> = source
        .documents
        .values()
        .filter(|doc| !target.documents.contains_key(doc.name()))
        .collect();

    // uuid -> target-only name, first name wins
    let mut target_only_by_uuid: HashMap<&str, &ConfigDocument> = HashMap::new();
    for doc in target.documents.values() {
        if source.documents.contains_key(doc.name()) {
            continue;
        }
        if let Some(uuid) = doc.uuid() {
            target_only_by_uuid.entry(uuid).or_insert(doc);
        }
    }

    let mut renamed_from: BTreeSet<&str> = BTreeSet::new();
    for doc in source_only {
        let previous = doc
            .uuid()
            .and_then(|uuid| target_only_by_uuid.remove(uuid));
        match previous {
            Some(old) => {
                renamed_from.insert(old.name());
                changelist.rename.push(Rename {
                    from: old.name().to_string(),
                    to: doc.name().to_string(),
                    content_changed: !doc.content_equals(old),
                });
            }
            None => changelist.create.push(doc.name().to_string()),
        }
    }

    for doc in target.documents.values() {
        match source.documents.get(doc.name()) {
            Some(src) if !src.content_equals(doc) => changelist.update.push(doc.name().to_string()),
            Some(_) => {}
            None if renamed_from.contains(doc.name()) => {}
            None => changelist.delete.push(doc.name().to_string()),
        }
    }

    changelist
}
