//! Typed validation of configuration documents against JSON Schema
//!
//! Schemas are `*.schema.json` files, embedded from the workspace `schemas/`
//! directory or loaded from a directory at runtime. A schema covers the
//! config name equal to its file stem, or the glob given in its
//! `x-config-pattern` key (e.g. `image.style.*`).
//!
//! Keys every document may carry (`uuid`, `langcode`, `_schema`, `_core`,
//! `dependencies`) are injected into each object schema before compiling.

use crate::error::{Error, Result};
use crate::types::ConfigDocument;
use globset::{Glob, GlobMatcher};
use jsonschema::Validator;
use rust_embed::RustEmbed;
use serde_json::{json, Value};
use tracing::debug;

/// Embedded schema files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../schemas/"]
#[prefix = ""]
struct EmbeddedSchemas;

/// Suffix of schema file names
const SCHEMA_SUFFIX: &str = ".schema.json";

/// Key declaring the config-name glob a schema covers
const PATTERN_KEY: &str = "x-config-pattern";

/// How a schema is matched to config names
#[derive(Debug)]
enum Coverage {
    Exact(String),
    Pattern {
        matcher: GlobMatcher,
        literal_prefix: usize,
    },
}

#[derive(Debug)]
struct CompiledSchema {
    name: String,
    coverage: Coverage,
    validator: Validator,
}

/// Schema validator with pre-compiled schemas
#[derive(Debug)]
pub struct SchemaValidator {
    schemas: Vec<CompiledSchema>,
    strict: bool,
}

impl SchemaValidator {
    /// Create a new schema validator with embedded schemas
    pub fn new() -> Result<Self> {
        let mut sources = Vec::new();

        for file in EmbeddedSchemas::iter() {
            if !file.ends_with(SCHEMA_SUFFIX) {
                continue;
            }
            let name = file.trim_end_matches(SCHEMA_SUFFIX).to_string();
            debug!("Loading embedded schema: {}", name);

            if let Some(content) = EmbeddedSchemas::get(&file) {
                let json_str = std::str::from_utf8(&content.data).map_err(|_| {
                    Error::invalid_settings(format!("Invalid UTF-8 in schema: {}", file))
                })?;
                sources.push((name, serde_json::from_str(json_str)?));
            }
        }

        Self::from_schemas(sources)
    }

    /// Load from an external schema directory
    pub fn from_directory(path: &std::path::Path) -> Result<Self> {
        let mut sources = Vec::new();

        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let file_path = entry?.path();
                let Some(file_name) = file_path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if let Some(name) = file_name.strip_suffix(SCHEMA_SUFFIX) {
                    debug!("Loading schema from file: {:?}", file_path);
                    let content = std::fs::read_to_string(&file_path)?;
                    sources.push((name.to_string(), serde_json::from_str(&content)?));
                }
            }
        }

        if sources.is_empty() {
            return Err(Error::schema_not_found(format!(
                "No schemas found in {:?}",
                path
            )));
        }

        Self::from_schemas(sources)
    }

    /// Compile schemas given as `(name, schema)` pairs
    pub fn from_schemas(sources: impl IntoIterator<Item = (String, Value)>) -> Result<Self> {
        let mut schemas = Vec::new();

        for (name, mut schema) in sources {
            let coverage = match schema.get(PATTERN_KEY).and_then(Value::as_str) {
                Some(pattern) => {
                    let matcher = Glob::new(pattern)
                        .map_err(|e| {
                            Error::invalid_settings(format!(
                                "Invalid pattern in schema {}: {}",
                                name, e
                            ))
                        })?
                        .compile_matcher();
                    let literal_prefix = pattern
                        .find(&['*', '?', '[', '{'][..])
                        .unwrap_or(pattern.len());
                    Coverage::Pattern {
                        matcher,
                        literal_prefix,
                    }
                }
                None => Coverage::Exact(name.clone()),
            };

            inject_base_properties(&mut schema);

            let validator = jsonschema::validator_for(&schema).map_err(|e| {
                Error::invalid_settings(format!("Failed to compile schema {}: {}", name, e))
            })?;

            schemas.push(CompiledSchema {
                name,
                coverage,
                validator,
            });
        }

        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            schemas,
            strict: false,
        })
    }

    /// Reject documents no schema covers
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Name of the schema covering `config_name`
    ///
    /// An exact match wins over patterns; among patterns the one with the
    /// longest literal prefix wins.
    pub fn schema_for_name(&self, config_name: &str) -> Option<&str> {
        if let Some(exact) = self
            .schemas
            .iter()
            .find(|s| matches!(&s.coverage, Coverage::Exact(n) if n == config_name))
        {
            return Some(&exact.name);
        }

        self.schemas
            .iter()
            .filter_map(|s| match &s.coverage {
                Coverage::Pattern {
                    matcher,
                    literal_prefix,
                } if matcher.is_match(config_name) => Some((s, *literal_prefix)),
                _ => None,
            })
            .max_by_key(|(_, prefix)| *prefix)
            .map(|(s, _)| s.name.as_str())
    }

    /// Validate a document, returning every problem found
    ///
    /// Messages are prefixed with the document name. An empty list means the
    /// document is accepted.
    pub fn validate_document(&self, doc: &ConfigDocument) -> Vec<String> {
        let schema_name = match doc.schema_name() {
            Some(declared) => {
                if !self.has_schema(declared) {
                    return vec![format!(
                        "{}: declares unknown schema '{}'",
                        doc.name(),
                        declared
                    )];
                }
                declared.to_string()
            }
            None => match self.schema_for_name(doc.name()) {
                Some(found) => found.to_string(),
                None if self.strict => {
                    return vec![format!("{}: no schema is defined for this configuration", doc.name())]
                }
                None => {
                    debug!("No schema covers {}, skipping typed validation", doc.name());
                    return Vec::new();
                }
            },
        };

        let value = match doc.to_json() {
            Ok(value) => value,
            Err(e) => return vec![e.to_string()],
        };

        match self.collect_errors(&value, &schema_name) {
            Ok(errors) => errors
                .into_iter()
                .map(|e| format!("{}: {}", doc.name(), e))
                .collect(),
            Err(e) => vec![format!("{}: {}", doc.name(), e)],
        }
    }

    /// Validate JSON value against a schema
    pub fn validate(&self, value: &Value, schema_name: &str) -> Result<()> {
        let errors = self.collect_errors(value, schema_name)?;
        if !errors.is_empty() {
            return Err(Error::schema_validation(errors));
        }
        Ok(())
    }

    fn collect_errors(&self, value: &Value, schema_name: &str) -> Result<Vec<String>> {
        let schema = self
            .schemas
            .iter()
            .find(|s| s.name == schema_name)
            .ok_or_else(|| Error::schema_not_found(schema_name))?;

        Ok(schema
            .validator
            .iter_errors(value)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    format!("{}", e)
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect())
    }

    /// Check if a schema exists
    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.iter().any(|s| s.name == name)
    }

    /// List available schemas
    pub fn list_schemas(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Add the keys every document may carry to an object schema
fn inject_base_properties(schema: &mut Value) {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return;
    }
    let Some(object) = schema.as_object_mut() else {
        return;
    };
    let properties = object
        .entry("properties")
        .or_insert_with(|| json!({}));
    let Some(properties) = properties.as_object_mut() else {
        return;
    };

    let list = json!({ "type": "array", "items": { "type": "string" } });
    let lists = json!({
        "module": list,
        "theme": list,
        "config": list,
        "content": list,
    });
    let mut dependency_properties = lists.clone();
    if let Some(map) = dependency_properties.as_object_mut() {
        map.insert(
            "enforced".to_string(),
            json!({ "type": "object", "additionalProperties": false, "properties": lists }),
        );
    }

    let base = [
        ("uuid", json!({ "type": "string" })),
        ("langcode", json!({ "type": "string" })),
        ("_schema", json!({ "type": "string" })),
        ("_core", json!({ "type": "object" })),
        (
            "dependencies",
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": dependency_properties,
            }),
        ),
    ];
    for (key, value) in base {
        properties.entry(key.to_string()).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, yaml: &str) -> ConfigDocument {
        ConfigDocument::from_yaml(name, yaml).unwrap()
    }

    #[test]
    fn test_validator_creation() {
        let validator = SchemaValidator::new().unwrap();
        assert!(validator.has_schema("system.site"));
        assert!(validator.has_schema("core.extension"));
    }

    #[test]
    fn test_resolution_exact_and_pattern() {
        let validator = SchemaValidator::new().unwrap();
        assert_eq!(validator.schema_for_name("system.site"), Some("system.site"));
        assert_eq!(validator.schema_for_name("image.style.large"), Some("image.style"));
        assert_eq!(validator.schema_for_name("system.menu.main"), Some("system.menu"));
        assert_eq!(validator.schema_for_name("unknown.thing"), None);
    }

    #[test]
    fn test_longest_literal_prefix_wins() {
        let validator = SchemaValidator::from_schemas(vec![
            (
                "any".to_string(),
                json!({ "x-config-pattern": "views.*", "type": "object" }),
            ),
            (
                "view".to_string(),
                json!({ "x-config-pattern": "views.view.*", "type": "object" }),
            ),
        ])
        .unwrap();
        assert_eq!(validator.schema_for_name("views.view.content"), Some("view"));
        assert_eq!(validator.schema_for_name("views.settings"), Some("any"));
    }

    #[test]
    fn test_valid_document() {
        let validator = SchemaValidator::new().unwrap();
        let site = doc(
            "system.site",
            "uuid: 6a8e-11\nname: Foo\nmail: a@b.c\npage:\n  front: /node\nweight_select_max: 100\n",
        );
        assert!(validator.validate_document(&site).is_empty());
    }

    #[test]
    fn test_collects_every_error() {
        let validator = SchemaValidator::new().unwrap();
        let site = doc(
            "system.site",
            "mail: 42\nadmin_compact_mode: 'yes'\nunexpected: true\n",
        );
        let errors = validator.validate_document(&site);
        // missing name, wrong mail type, wrong boolean, unknown key
        assert!(errors.len() >= 4, "got {:?}", errors);
        assert!(errors.iter().all(|e| e.starts_with("system.site: ")));
        assert!(errors.iter().any(|e| e.contains("name")));
        assert!(errors.iter().any(|e| e.contains("/mail")));
        assert!(errors.iter().any(|e| e.contains("unexpected")));
    }

    #[test]
    fn test_nested_schema_errors() {
        let validator = SchemaValidator::new().unwrap();
        let style = doc(
            "image.style.large",
            "name: large\nlabel: Large\neffects:\n  abc:\n    id: image_scale\n    weight: heavy\n",
        );
        let errors = validator.validate_document(&style);
        assert_eq!(errors.len(), 1, "got {:?}", errors);
        assert!(errors[0].contains("/effects/abc/weight"));
    }

    #[test]
    fn test_base_properties_accepted() {
        let validator = SchemaValidator::new().unwrap();
        let menu = doc(
            "system.menu.main",
            "uuid: abc\nlangcode: en\nid: main\nlabel: Main\ndependencies:\n  module: [system]\n  enforced:\n    module: [menu_ui]\n",
        );
        assert!(validator.validate_document(&menu).is_empty());

        let bad = doc(
            "system.menu.main",
            "id: main\nlabel: Main\ndependencies:\n  modules: [system]\n",
        );
        assert_eq!(validator.validate_document(&bad).len(), 1);
    }

    #[test]
    fn test_explicit_schema_declaration() {
        let validator = SchemaValidator::new().unwrap();
        let custom = doc("custom.site_copy", "_schema: system.site\nname: Copy\n");
        assert!(validator.validate_document(&custom).is_empty());

        let unknown = doc("custom.thing", "_schema: nope\n");
        let errors = validator.validate_document(&unknown);
        assert_eq!(errors, vec!["custom.thing: declares unknown schema 'nope'"]);
    }

    #[test]
    fn test_strict_mode_for_unknown_names() {
        let lenient = SchemaValidator::new().unwrap();
        let thing = doc("unknown.thing", "anything: goes\n");
        assert!(lenient.validate_document(&thing).is_empty());

        let strict = SchemaValidator::new().unwrap().with_strict(true);
        assert_eq!(strict.validate_document(&thing).len(), 1);
    }

    #[test]
    fn test_validate_nonexistent_schema() {
        let validator = SchemaValidator::new().unwrap();
        let result = validator.validate(&json!({}), "nonexistent-schema");
        assert!(matches!(result, Err(Error::SchemaNotFound { .. })));
    }

    #[test]
    fn test_from_directory_empty_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let result = SchemaValidator::from_directory(temp_dir.path());
        assert!(matches!(result, Err(Error::SchemaNotFound { .. })));
    }

    #[test]
    fn test_from_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("mymodule.settings.schema.json"),
            r#"{"type": "object", "additionalProperties": false, "properties": {"limit": {"type": "integer"}}}"#,
        )
        .unwrap();
        let validator = SchemaValidator::from_directory(temp_dir.path()).unwrap();
        assert_eq!(validator.list_schemas(), vec!["mymodule.settings"]);
        let bad = doc("mymodule.settings", "limit: many\n");
        assert_eq!(validator.validate_document(&bad).len(), 1);
    }
}
