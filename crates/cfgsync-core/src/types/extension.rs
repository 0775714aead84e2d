//! The reserved `core.extension` document and extension identifiers

use crate::error::{Error, Result};
use crate::types::ConfigDocument;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the document listing installed modules and themes
pub const CORE_EXTENSION: &str = "core.extension";

/// Name of the site identity document
pub const SYSTEM_SITE: &str = "system.site";

/// Kind of extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Module,
    Theme,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::Module => write!(f, "module"),
            ExtensionKind::Theme => write!(f, "theme"),
        }
    }
}

/// An extension identified by kind and machine name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtensionRef {
    pub kind: ExtensionKind,
    pub name: String,
}

impl ExtensionRef {
    pub fn module(name: impl Into<String>) -> Self {
        Self {
            kind: ExtensionKind::Module,
            name: name.into(),
        }
    }

    pub fn theme(name: impl Into<String>) -> Self {
        Self {
            kind: ExtensionKind::Theme,
            name: name.into(),
        }
    }
}

impl fmt::Display for ExtensionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Decoded `core.extension` document
///
/// ```yaml
/// module:
///   system: 0
///   node: 0
///   views: 10
/// theme:
///   olivero: 0
/// profile: standard
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreExtension {
    /// Installed modules with their weights
    #[serde(default)]
    pub module: BTreeMap<String, i64>,

    /// Installed themes
    #[serde(default)]
    pub theme: BTreeMap<String, i64>,

    /// Install profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl CoreExtension {
    /// Decode from a `core.extension` document
    pub fn from_document(doc: &ConfigDocument) -> Result<Self> {
        let mut data = doc.data().clone();
        data.shift_remove("_core");
        serde_yaml_ng::from_value(Value::Mapping(data))
            .map_err(|e| Error::invalid_data(doc.name(), e.to_string()))
    }

    /// Every installed extension, modules first
    pub fn extensions(&self) -> Vec<ExtensionRef> {
        self.module
            .keys()
            .map(ExtensionRef::module)
            .chain(self.theme.keys().map(ExtensionRef::theme))
            .collect()
    }

    pub fn contains(&self, ext: &ExtensionRef) -> bool {
        match ext.kind {
            ExtensionKind::Module => self.module.contains_key(&ext.name),
            ExtensionKind::Theme => self.theme.contains_key(&ext.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_core_extension() {
        let doc = ConfigDocument::from_yaml(
            CORE_EXTENSION,
            "_core:\n  default_config_hash: abc\nmodule:\n  system: 0\n  node: 5\ntheme:\n  olivero: 0\nprofile: standard\n",
        )
        .unwrap();
        let core = CoreExtension::from_document(&doc).unwrap();
        assert_eq!(core.module.get("node"), Some(&5));
        assert_eq!(core.profile.as_deref(), Some("standard"));
        assert!(core.contains(&ExtensionRef::theme("olivero")));
        assert!(!core.contains(&ExtensionRef::module("olivero")));
        assert_eq!(
            core.extensions(),
            vec![
                ExtensionRef::module("node"),
                ExtensionRef::module("system"),
                ExtensionRef::theme("olivero"),
            ]
        );
    }

    #[test]
    fn test_decode_invalid_core_extension() {
        let doc = ConfigDocument::from_yaml(CORE_EXTENSION, "module: [system, node]\n").unwrap();
        assert!(CoreExtension::from_document(&doc).is_err());
    }

    #[test]
    fn test_extension_ref_display() {
        assert_eq!(ExtensionRef::module("views").to_string(), "module views");
    }
}
