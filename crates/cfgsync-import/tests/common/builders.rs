//! Builders for storages and documents used as test fixtures

#![allow(dead_code)]

use cfgsync_core::{ConfigDocument, ConfigStorage, MemoryStorage, SharedStorage};
use serde_yaml_ng::Mapping;
use std::sync::Arc;

/// Parse YAML into document data
pub fn data(yaml: &str) -> Mapping {
    ConfigDocument::from_yaml("test.fixture", yaml)
        .unwrap()
        .into_data()
}

/// In-memory storage holding the given `(name, yaml)` documents
pub fn storage_with(docs: &[(&str, &str)]) -> Arc<MemoryStorage> {
    let storage = MemoryStorage::new();
    for (name, yaml) in docs {
        storage.write(name, &data(yaml)).unwrap();
    }
    Arc::new(storage)
}

/// Same as [`storage_with`], typed as a shared storage
pub fn shared_with(docs: &[(&str, &str)]) -> SharedStorage {
    storage_with(docs)
}

/// Dependency section listing config dependencies
pub fn config_deps(deps: &[&str]) -> String {
    format!("dependencies:\n  config: [{}]\n", deps.join(", "))
}

/// `core.extension` document with the given modules and themes
pub fn core_extension(modules: &[&str], themes: &[&str], profile: Option<&str>) -> String {
    let mut yaml = String::from("module:\n");
    for module in modules {
        yaml.push_str(&format!("  {}: 0\n", module));
    }
    if modules.is_empty() {
        yaml = String::from("module: {}\n");
    }
    if themes.is_empty() {
        yaml.push_str("theme: {}\n");
    } else {
        yaml.push_str("theme:\n");
        for theme in themes {
            yaml.push_str(&format!("  {}: 0\n", theme));
        }
    }
    if let Some(profile) = profile {
        yaml.push_str(&format!("profile: {}\n", profile));
    }
    yaml
}
