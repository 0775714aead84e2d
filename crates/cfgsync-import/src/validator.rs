//! Changelist validation
//!
//! Validation runs an explicit, ordered list of [`ImportCheck`] handlers over
//! a computed changelist. Every check runs and every error is collected, so a
//! user can fix all problems in one pass. Validation never mutates storage.
//!
//! Built-in checks, in order:
//! 1. config names
//! 2. site identity
//! 3. uuid conflicts
//! 4. schema
//! 5. core.extension changes
//! 6. config dependencies
//! 7. dependency cycles

use crate::comparer::{Changelist, ExtensionChangelist, StorageComparer};
use crate::dependency::DependencyResolver;
use crate::error::ImportError;
use crate::lifecycle::ExtensionLifecycle;
use cfgsync_core::names::{owner, validate_name};
use cfgsync_core::types::{ExtensionKind, ExtensionRef, SYSTEM_SITE};
use cfgsync_core::SchemaValidator;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Everything a check may look at
pub struct ValidationContext<'a> {
    pub comparer: &'a StorageComparer,
    pub extension_changes: &'a ExtensionChangelist,
    pub lifecycle: Option<&'a dyn ExtensionLifecycle>,
    pub schemas: Option<&'a SchemaValidator>,
    pub resolver: &'a DependencyResolver,
}

impl<'a> ValidationContext<'a> {
    pub fn changelist(&self) -> &'a Changelist {
        self.comparer.changelist()
    }

    /// Extensions that will be installed once the import has run
    ///
    /// Taken from the source `core.extension`; without one, whatever the
    /// lifecycle reports now. `None` when neither is available.
    pub fn extensions_after_import(&self) -> Result<Option<BTreeSet<ExtensionRef>>, String> {
        match self.comparer.source_extensions() {
            Ok(Some(core)) => return Ok(Some(core.extensions().into_iter().collect())),
            Ok(None) => {}
            Err(e) => return Err(e.to_string()),
        }
        match self.lifecycle {
            Some(lifecycle) => lifecycle
                .list_installed()
                .map(Some)
                .map_err(|e| format!("Unable to list installed extensions: {:#}", e)),
            None => Ok(None),
        }
    }
}

/// A validation handler
pub trait ImportCheck: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Return every problem found; empty means the check passed
    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String>;
}

/// Ordered list of checks
pub struct ValidationPipeline {
    checks: Vec<Box<dyn ImportCheck>>,
}

impl ValidationPipeline {
    /// A pipeline without any checks
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// The built-in checks in their standard order
    pub fn with_defaults() -> Self {
        Self::empty()
            .with(Box::new(ConfigNameCheck))
            .with(Box::new(SiteIdentityCheck))
            .with(Box::new(UuidConflictCheck))
            .with(Box::new(SchemaCheck))
            .with(Box::new(ExtensionCheck))
            .with(Box::new(ConfigDependencyCheck))
            .with(Box::new(CycleCheck))
    }

    /// Append a check; it runs after every check registered before it
    pub fn register(&mut self, check: Box<dyn ImportCheck>) {
        self.checks.push(check);
    }

    pub fn with(mut self, check: Box<dyn ImportCheck>) -> Self {
        self.register(check);
        self
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every check and collect all errors
    pub fn run(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let mut errors = Vec::new();
        for check in &self.checks {
            let found = check.check(ctx);
            debug!("Check {} reported {} error(s)", check.name(), found.len());
            errors.extend(found);
        }
        errors
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Written names must follow the naming rules
pub struct ConfigNameCheck;

impl ImportCheck for ConfigNameCheck {
    fn name(&self) -> &str {
        "config-names"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        ctx.changelist()
            .written_names()
            .filter_map(|name| validate_name(name).err())
            .map(|e| e.to_string())
            .collect()
    }
}

/// Both storages must belong to the same site
pub struct SiteIdentityCheck;

impl ImportCheck for SiteIdentityCheck {
    fn name(&self) -> &str {
        "site-identity"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let source = ctx.comparer.source_document(SYSTEM_SITE).and_then(|d| d.uuid());
        let target = ctx.comparer.target_document(SYSTEM_SITE).and_then(|d| d.uuid());
        match (source, target) {
            (Some(source), Some(target)) if source != target => {
                vec!["Site UUID in source storage does not match the target storage.".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

/// A name keeps its uuid, and a uuid belongs to one name
pub struct UuidConflictCheck;

impl ImportCheck for UuidConflictCheck {
    fn name(&self) -> &str {
        "uuid-conflicts"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let mut errors = Vec::new();

        // system.site is covered by SiteIdentityCheck
        for name in ctx.changelist().update.iter().filter(|n| *n != SYSTEM_SITE) {
            let source = ctx.comparer.source_document(name).and_then(|d| d.uuid());
            let target = ctx.comparer.target_document(name).and_then(|d| d.uuid());
            if let (Some(source), Some(target)) = (source, target) {
                if source != target {
                    errors.push(format!(
                        "Configuration {} has a different UUID in the source storage ({}) than in the target storage ({}).",
                        name, source, target
                    ));
                }
            }
        }

        let mut by_uuid: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for doc in ctx.comparer.source_documents() {
            if let Some(uuid) = doc.uuid() {
                by_uuid.entry(uuid).or_default().push(doc.name());
            }
        }
        for (uuid, names) in by_uuid {
            if names.len() > 1 {
                errors.push(format!(
                    "UUID {} is used by more than one configuration: {}.",
                    uuid,
                    names.join(", ")
                ));
            }
        }

        errors
    }
}

/// Written documents must match their schema
pub struct SchemaCheck;

impl ImportCheck for SchemaCheck {
    fn name(&self) -> &str {
        "schema"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let Some(schemas) = ctx.schemas else {
            return Vec::new();
        };
        ctx.changelist()
            .written_names()
            .filter_map(|name| ctx.comparer.source_document(name))
            .flat_map(|doc| schemas.validate_document(doc))
            .collect()
    }
}

/// Module and theme changes requested by `core.extension` must be possible
pub struct ExtensionCheck;

impl ExtensionCheck {
    fn check_installs(
        lifecycle: &dyn ExtensionLifecycle,
        installs: &[ExtensionRef],
        after: &BTreeSet<ExtensionRef>,
        errors: &mut Vec<String>,
    ) {
        for ext in installs {
            match lifecycle.info(ext) {
                Ok(Some(info)) => {
                    for dep in &info.dependencies {
                        if !after.contains(dep) {
                            errors.push(format!(
                                "Unable to install the {} since it requires the {}.",
                                ext, dep
                            ));
                        }
                    }
                }
                Ok(None) => errors.push(format!(
                    "Unable to install the {} since it does not exist.",
                    ext
                )),
                Err(e) => errors.push(format!("Unable to look up the {}: {:#}", ext, e)),
            }
        }
    }

    fn check_uninstalls(
        lifecycle: &dyn ExtensionLifecycle,
        uninstalls: &[ExtensionRef],
        after: &BTreeSet<ExtensionRef>,
        errors: &mut Vec<String>,
    ) {
        if uninstalls.is_empty() {
            return;
        }

        let mut remaining = Vec::new();
        for ext in after {
            match lifecycle.info(ext) {
                Ok(Some(info)) => remaining.push(info),
                Ok(None) => {}
                Err(e) => errors.push(format!("Unable to look up the {}: {:#}", ext, e)),
            }
        }

        for ext in uninstalls {
            match lifecycle.info(ext) {
                Ok(Some(info)) if info.required => {
                    errors.push(format!("Unable to uninstall the {} since it is required.", ext));
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("Unable to look up the {}: {:#}", ext, e)),
            }
            for dependent in remaining.iter().filter(|i| i.dependencies.contains(ext)) {
                errors.push(format!(
                    "Unable to uninstall the {} since the {} is installed.",
                    ext, dependent.extension
                ));
            }
        }
    }
}

impl ImportCheck for ExtensionCheck {
    fn name(&self) -> &str {
        "core-extension"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let source = match ctx.comparer.source_extensions() {
            Ok(Some(source)) => source,
            Ok(None) => return Vec::new(),
            Err(e) => return vec![e.to_string()],
        };
        let mut errors = Vec::new();

        match ctx.comparer.target_extensions() {
            Ok(Some(target)) => {
                if let Some(current) = &target.profile {
                    if source.profile.as_ref() != Some(current) {
                        errors.push(format!(
                            "Cannot change the install profile from '{}' to '{}' during configuration import.",
                            current,
                            source.profile.as_deref().unwrap_or("none")
                        ));
                    }
                }
            }
            Ok(None) => {}
            Err(e) => errors.push(e.to_string()),
        }

        let Some(lifecycle) = ctx.lifecycle else {
            return errors;
        };
        let after: BTreeSet<ExtensionRef> = source.extensions().into_iter().collect();
        Self::check_installs(lifecycle, &ctx.extension_changes.install, &after, &mut errors);
        Self::check_uninstalls(lifecycle, &ctx.extension_changes.uninstall, &after, &mut errors);

        errors
    }
}

/// Written documents' dependencies must exist after the import
pub struct ConfigDependencyCheck;

impl ImportCheck for ConfigDependencyCheck {
    fn name(&self) -> &str {
        "config-dependencies"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let mut errors = Vec::new();
        let after = match ctx.extensions_after_import() {
            Ok(after) => after,
            Err(e) => {
                errors.push(e);
                None
            }
        };
        // The owner of a document is only enforced when core.extension
        // states the extension list explicitly.
        let explicit = matches!(ctx.comparer.source_extensions(), Ok(Some(_)));

        for name in ctx.changelist().written_names() {
            let Some(doc) = ctx.comparer.source_document(name) else {
                continue;
            };

            if explicit {
                if let Some(after) = &after {
                    let owner = owner(name);
                    let owned = owner == "core"
                        || after.contains(&ExtensionRef::module(owner))
                        || after.contains(&ExtensionRef::theme(owner));
                    if !owned {
                        errors.push(format!(
                            "Configuration {} depends on the {} extension that will not be installed after import.",
                            name, owner
                        ));
                    }
                }
            }

            let deps = match doc.dependencies() {
                Ok(deps) => deps,
                Err(e) => {
                    errors.push(e.to_string());
                    continue;
                }
            };

            for dep in &deps.module {
                if after.as_ref().is_some_and(|a| !a.contains(&ExtensionRef::module(dep))) {
                    errors.push(format!(
                        "Configuration {} depends on the {} {} that will not be installed after import.",
                        name,
                        ExtensionKind::Module,
                        dep
                    ));
                }
            }
            for dep in &deps.theme {
                if after.as_ref().is_some_and(|a| !a.contains(&ExtensionRef::theme(dep))) {
                    errors.push(format!(
                        "Configuration {} depends on the {} {} that will not be installed after import.",
                        name,
                        ExtensionKind::Theme,
                        dep
                    ));
                }
            }
            for dep in &deps.config {
                if ctx.comparer.source_document(dep).is_none() {
                    errors.push(format!(
                        "Configuration {} depends on the configuration {} that will not exist after import.",
                        name, dep
                    ));
                }
            }
        }

        errors
    }
}

/// The pending steps must be orderable
pub struct CycleCheck;

impl ImportCheck for CycleCheck {
    fn name(&self) -> &str {
        "dependency-cycles"
    }

    fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        match ctx.resolver.resolve(ctx.changelist(), ctx.extension_changes) {
            Ok(_) => Vec::new(),
            Err(e @ ImportError::DependencyCycle { .. }) => e.messages(),
            Err(e) => vec![e.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgsync_core::{ConfigDocument, ConfigStorage, MemoryStorage};
    use std::sync::Arc;

    fn storage(docs: &[(&str, &str)]) -> Arc<MemoryStorage> {
        let storage = MemoryStorage::new();
        for (name, yaml) in docs {
            let doc = ConfigDocument::from_yaml(*name, yaml).unwrap();
            storage.write(name, doc.data()).unwrap();
        }
        Arc::new(storage)
    }

    fn run(pipeline: &ValidationPipeline, source: &[(&str, &str)], target: &[(&str, &str)]) -> Vec<String> {
        let mut comparer = StorageComparer::new(storage(source), storage(target));
        comparer.create_changelist().unwrap();
        let extension_changes = ExtensionChangelist::default();
        let resolver = DependencyResolver::from_comparer(&comparer, &extension_changes, None).unwrap();
        let ctx = ValidationContext {
            comparer: &comparer,
            extension_changes: &extension_changes,
            lifecycle: None,
            schemas: None,
            resolver: &resolver,
        };
        pipeline.run(&ctx)
    }

    #[test]
    fn test_default_order() {
        assert_eq!(
            ValidationPipeline::default().check_names(),
            vec![
                "config-names",
                "site-identity",
                "uuid-conflicts",
                "schema",
                "core-extension",
                "config-dependencies",
                "dependency-cycles"
            ]
        );
    }

    #[test]
    fn test_site_uuid_mismatch() {
        let errors = run(
            &ValidationPipeline::with_defaults(),
            &[("system.site", "uuid: aaa\nname: Foo")],
            &[("system.site", "uuid: bbb\nname: Foo")],
        );
        assert!(errors
            .iter()
            .any(|e| e == "Site UUID in source storage does not match the target storage."));
    }

    #[test]
    fn test_errors_are_aggregated() {
        let errors = run(
            &ValidationPipeline::with_defaults(),
            &[
                ("x.a", "dependencies:\n  config: [x.missing]\n"),
                ("x.b", "dependencies:\n  config: [x.gone]\n"),
            ],
            &[],
        );
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn test_registered_check_runs_last() {
        struct Forbid;
        impl ImportCheck for Forbid {
            fn name(&self) -> &str {
                "forbid"
            }
            fn check(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
                ctx.changelist()
                    .create
                    .iter()
                    .filter(|n| n.starts_with("devel."))
                    .map(|n| format!("{} may not be imported", n))
                    .collect()
            }
        }

        let pipeline = ValidationPipeline::with_defaults().with(Box::new(Forbid));
        assert_eq!(pipeline.check_names().last(), Some(&"forbid"));
        let errors = run(&pipeline, &[("devel.settings", "a: 1")], &[]);
        assert_eq!(errors, vec!["devel.settings may not be imported"]);
    }
}
