//! Mock implementations for testing
//!
//! Provides an in-memory extension lifecycle and a storage that fails on
//! demand, so import failures can be tested without side effects.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use cfgsync_core::types::{ExtensionKind, ExtensionRef};
use cfgsync_core::{ConfigDocument, ConfigStorage, Error, MemoryStorage};
use cfgsync_import::{ExtensionInfo, ExtensionLifecycle};
use serde_yaml_ng::Mapping;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

/// Extension lifecycle keeping installed extensions in memory
#[derive(Default)]
pub struct MockLifecycle {
    installed: Mutex<BTreeSet<ExtensionRef>>,
    /// Known extensions; `None` accepts everything
    catalog: Option<BTreeMap<ExtensionRef, ExtensionInfo>>,
    fail_on: Option<ExtensionRef>,
    calls: Mutex<Vec<String>>,
}

impl MockLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installed(self, extensions: &[ExtensionRef]) -> Self {
        self.installed
            .lock()
            .unwrap()
            .extend(extensions.iter().cloned());
        self
    }

    /// Add an extension to the catalog
    pub fn with_available(mut self, info: ExtensionInfo) -> Self {
        self.catalog
            .get_or_insert_with(BTreeMap::new)
            .insert(info.extension.clone(), info);
        self
    }

    /// Fail any install or uninstall of this extension
    pub fn failing_on(mut self, extension: ExtensionRef) -> Self {
        self.fail_on = Some(extension);
        self
    }

    /// Recorded calls, e.g. `install module views`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn installed(&self) -> BTreeSet<ExtensionRef> {
        self.installed.lock().unwrap().clone()
    }

    fn apply(&self, action: &str, kind: ExtensionKind, names: &[String]) -> Result<()> {
        for name in names {
            let ext = ExtensionRef {
                kind,
                name: name.clone(),
            };
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", action, ext));
            if self.fail_on.as_ref() == Some(&ext) {
                return Err(anyhow!("simulated {} failure for {}", action, ext));
            }
            let mut installed = self.installed.lock().unwrap();
            if action == "install" {
                installed.insert(ext);
            } else {
                installed.remove(&ext);
            }
        }
        Ok(())
    }
}

impl ExtensionLifecycle for MockLifecycle {
    fn install(&self, kind: ExtensionKind, names: &[String]) -> Result<()> {
        self.apply("install", kind, names)
    }

    fn uninstall(&self, kind: ExtensionKind, names: &[String]) -> Result<()> {
        self.apply("uninstall", kind, names)
    }

    fn list_installed(&self) -> Result<BTreeSet<ExtensionRef>> {
        Ok(self.installed())
    }

    fn info(&self, extension: &ExtensionRef) -> Result<Option<ExtensionInfo>> {
        Ok(match &self.catalog {
            Some(catalog) => catalog.get(extension).cloned(),
            None => Some(ExtensionInfo::new(extension.clone())),
        })
    }
}

/// Memory storage whose mutations fail on request
#[derive(Default)]
pub struct FailingStorage {
    inner: MemoryStorage,
    fail_name: Option<String>,
    /// Fail the Nth mutation (1-based)
    fail_at: Option<usize>,
    mutations: AtomicUsize,
}

impl FailingStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail every write or delete of `name`
    pub fn failing_on(mut self, name: &str) -> Self {
        self.fail_name = Some(name.to_string());
        self
    }

    /// Fail the Nth write or delete
    pub fn failing_at(mut self, mutation: usize) -> Self {
        self.fail_at = Some(mutation);
        self
    }

    /// Number of attempted writes and deletes
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn check(&self, name: &str) -> cfgsync_core::Result<()> {
        let count = self.mutations.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_name.as_deref() == Some(name) || self.fail_at == Some(count) {
            return Err(Error::write(name, "simulated storage failure"));
        }
        Ok(())
    }
}

impl ConfigStorage for FailingStorage {
    fn label(&self) -> String {
        "failing".to_string()
    }

    fn exists(&self, name: &str) -> cfgsync_core::Result<bool> {
        self.inner.exists(name)
    }

    fn read(&self, name: &str) -> cfgsync_core::Result<ConfigDocument> {
        self.inner.read(name)
    }

    fn write(&self, name: &str, data: &Mapping) -> cfgsync_core::Result<()> {
        self.check(name)?;
        self.inner.write(name, data)
    }

    fn delete(&self, name: &str) -> cfgsync_core::Result<()> {
        self.check(name)?;
        self.inner.delete(name)
    }

    fn list_all(&self, prefix: &str) -> cfgsync_core::Result<Vec<String>> {
        self.inner.list_all(prefix)
    }
}

/// Storage that accepts any name, for feeding malformed names to checks
#[derive(Default)]
pub struct UncheckedStorage {
    documents: RwLock<BTreeMap<String, Mapping>>,
}

impl UncheckedStorage {
    pub fn with(docs: &[(&str, &str)]) -> Self {
        let storage = Self::default();
        for (name, yaml) in docs {
            storage
                .documents
                .write()
                .unwrap()
                .insert(name.to_string(), super::builders::data(yaml));
        }
        storage
    }
}

impl ConfigStorage for UncheckedStorage {
    fn label(&self) -> String {
        "unchecked".to_string()
    }

    fn exists(&self, name: &str) -> cfgsync_core::Result<bool> {
        Ok(self.documents.read().unwrap().contains_key(name))
    }

    fn read(&self, name: &str) -> cfgsync_core::Result<ConfigDocument> {
        self.documents
            .read()
            .unwrap()
            .get(name)
            .map(|data| ConfigDocument::new(name, data.clone()))
            .ok_or_else(|| Error::not_found(name))
    }

    fn write(&self, name: &str, data: &Mapping) -> cfgsync_core::Result<()> {
        self.documents
            .write()
            .unwrap()
            .insert(name.to_string(), data.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> cfgsync_core::Result<()> {
        self.documents
            .write()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(name))
    }

    fn list_all(&self, prefix: &str) -> cfgsync_core::Result<Vec<String>> {
        Ok(self
            .documents
            .read()
            .unwrap()
            .keys()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect())
    }
}
