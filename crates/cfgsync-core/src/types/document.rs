//! Configuration documents and their well-known keys

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::{Mapping, Value};
use std::fmt;

/// Key holding the document's universally unique identifier
pub const UUID_KEY: &str = "uuid";

/// Key holding the document's dependency section
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// Key naming the schema a document declares for itself
pub const SCHEMA_KEY: &str = "_schema";

/// A named configuration document
///
/// The data is an ordered YAML mapping. Equality of content is structural:
/// two documents that differ only in YAML formatting or key order compare
/// equal.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    name: String,
    data: Mapping,
}

impl ConfigDocument {
    /// Create a document from already decoded data
    pub fn new(name: impl Into<String>, data: Mapping) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Decode a document from YAML text
    ///
    /// An empty file decodes to an empty mapping. Any other non-mapping
    /// top-level value is rejected.
    pub fn from_yaml(name: impl Into<String>, yaml: &str) -> Result<Self> {
        let name = name.into();
        let value: Value = serde_yaml_ng::from_str(yaml)?;
        let data = match value {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            other => {
                return Err(Error::invalid_data(
                    &name,
                    format!("expected a mapping, found {}", value_kind(&other)),
                ))
            }
        };
        Ok(Self { name, data })
    }

    /// Encode the document data as YAML text
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(&self.data)?)
    }

    /// Convert the data to JSON for schema validation and display
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.data)
            .map_err(|e| Error::invalid_data(&self.name, e.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Mapping {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Mapping {
        &mut self.data
    }

    pub fn into_data(self) -> Mapping {
        self.data
    }

    /// Copy this document under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: self.data.clone(),
        }
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a top-level key, keeping the position of an existing key
    pub fn set(&mut self, key: &str, value: Value) {
        self.data.insert(Value::String(key.to_string()), value);
    }

    /// Remove a top-level key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    /// The document's uuid, if it carries one
    pub fn uuid(&self) -> Option<&str> {
        self.get(UUID_KEY).and_then(Value::as_str)
    }

    /// The explicitly declared schema name, if any
    pub fn schema_name(&self) -> Option<&str> {
        self.get(SCHEMA_KEY).and_then(Value::as_str)
    }

    /// Structural comparison of the data, ignoring the name
    pub fn content_equals(&self, other: &ConfigDocument) -> bool {
        self.data == other.data
    }

    /// Structural comparison ignoring the name and the given top-level keys
    pub fn content_equals_except(&self, other: &ConfigDocument, keys: &[&str]) -> bool {
        let strip = |doc: &ConfigDocument| {
            let mut data = doc.data.clone();
            for key in keys {
                data.shift_remove(*key);
            }
            data
        };
        strip(self) == strip(other)
    }

    /// Parse the dependency section
    ///
    /// The `enforced` sub-section is merged into the plain lists.
    pub fn dependencies(&self) -> Result<Dependencies> {
        let Some(value) = self.get(DEPENDENCIES_KEY) else {
            return Ok(Dependencies::default());
        };
        if value.is_null() {
            return Ok(Dependencies::default());
        }

        let section: DependencySection = serde_yaml_ng::from_value(value.clone())
            .map_err(|e| Error::invalid_data(&self.name, format!("invalid dependencies: {}", e)))?;

        let mut deps = Dependencies {
            module: section.lists.module,
            theme: section.lists.theme,
            config: section.lists.config,
            content: section.lists.content,
        };
        if let Some(enforced) = section.enforced {
            merge_unique(&mut deps.module, enforced.module);
            merge_unique(&mut deps.theme, enforced.theme);
            merge_unique(&mut deps.config, enforced.config);
            merge_unique(&mut deps.content, enforced.content);
        }
        Ok(deps)
    }
}

fn merge_unique(target: &mut Vec<String>, extra: Vec<String>) {
    for item in extra {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// Human readable kind of a YAML value
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[derive(Debug, Default, Deserialize)]
struct DependencyLists {
    #[serde(default)]
    module: Vec<String>,
    #[serde(default)]
    theme: Vec<String>,
    #[serde(default)]
    config: Vec<String>,
    #[serde(default)]
    content: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DependencySection {
    #[serde(flatten)]
    lists: DependencyLists,
    #[serde(default)]
    enforced: Option<DependencyLists>,
}

/// What a dependency points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Module,
    Theme,
    Config,
    Content,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Module => write!(f, "module"),
            DependencyKind::Theme => write!(f, "theme"),
            DependencyKind::Config => write!(f, "configuration"),
            DependencyKind::Content => write!(f, "content"),
        }
    }
}

/// Declared dependencies of a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    pub module: Vec<String>,
    pub theme: Vec<String>,
    pub config: Vec<String>,
    pub content: Vec<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.module.is_empty()
            && self.theme.is_empty()
            && self.config.is_empty()
            && self.content.is_empty()
    }

    /// Every dependency with its kind, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (DependencyKind, &str)> + '_ {
        [
            (DependencyKind::Module, &self.module),
            (DependencyKind::Theme, &self.theme),
            (DependencyKind::Config, &self.config),
            (DependencyKind::Content, &self.content),
        ]
        .into_iter()
        .flat_map(|(kind, list)| list.iter().map(move |name| (kind, name.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_preserves_key_order() {
        let doc = ConfigDocument::from_yaml("system.site", "zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<_> = doc.data().keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let yaml = doc.to_yaml().unwrap();
        let zeta = yaml.find("zeta").unwrap();
        let alpha = yaml.find("alpha").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn test_empty_yaml_is_empty_mapping() {
        let doc = ConfigDocument::from_yaml("system.empty", "").unwrap();
        assert!(doc.data().is_empty());
    }

    #[test]
    fn test_scalar_document_rejected() {
        let err = ConfigDocument::from_yaml("system.bad", "just a string").unwrap_err();
        assert!(matches!(err, Error::InvalidData { .. }));
    }

    #[test]
    fn test_formatting_differences_are_equal() {
        let a = ConfigDocument::from_yaml("a.b", "name: Foo\nlist: [1, 2]\n").unwrap();
        let b = ConfigDocument::from_yaml("a.b", "name:   'Foo'\nlist:\n  - 1\n  - 2\n").unwrap();
        assert!(a.content_equals(&b));
    }

    #[test]
    fn test_typed_scalars_differ() {
        let a = ConfigDocument::from_yaml("a.b", "value: 1\n").unwrap();
        let b = ConfigDocument::from_yaml("a.b", "value: '1'\n").unwrap();
        assert!(!a.content_equals(&b));
    }

    #[test]
    fn test_uuid_and_schema() {
        let doc =
            ConfigDocument::from_yaml("image.style.large", "uuid: abc-123\n_schema: image.style\n")
                .unwrap();
        assert_eq!(doc.uuid(), Some("abc-123"));
        assert_eq!(doc.schema_name(), Some("image.style"));
    }

    #[test]
    fn test_dependencies_with_enforced() {
        let doc = ConfigDocument::from_yaml(
            "views.view.content",
            r#"
dependencies:
  module: [node, user]
  config: [node.type.page]
  enforced:
    module: [views, node]
"#,
        )
        .unwrap();
        let deps = doc.dependencies().unwrap();
        assert_eq!(deps.module, vec!["node", "user", "views"]);
        assert_eq!(deps.config, vec!["node.type.page"]);
        assert!(deps.theme.is_empty());

        let all: Vec<_> = deps.iter().collect();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3], (DependencyKind::Config, "node.type.page"));
    }

    #[test]
    fn test_missing_dependencies_is_empty() {
        let doc = ConfigDocument::from_yaml("system.site", "name: Foo\n").unwrap();
        assert!(doc.dependencies().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_dependencies() {
        let doc = ConfigDocument::from_yaml("a.b", "dependencies:\n  module: node\n").unwrap();
        assert!(doc.dependencies().is_err());
    }

    #[test]
    fn test_content_equals_except() {
        let a = ConfigDocument::from_yaml("a.b", "uuid: one\nlabel: X\n").unwrap();
        let b = ConfigDocument::from_yaml("a.c", "uuid: one\nlabel: Y\n").unwrap();
        let c = ConfigDocument::from_yaml("a.c", "label: X\nuuid: two\n").unwrap();
        assert!(!a.content_equals_except(&b, &[UUID_KEY]));
        assert!(a.content_equals_except(&c, &[UUID_KEY]));
    }
}
