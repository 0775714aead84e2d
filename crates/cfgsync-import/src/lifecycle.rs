//! Extension lifecycle collaborator
//!
//! The importer does not know how modules and themes are installed. It
//! calls an [`ExtensionLifecycle`] at the points where the resolver placed
//! install and uninstall steps, and treats a failure like any other step
//! failure.

use anyhow::Result;
use cfgsync_core::types::{ExtensionKind, ExtensionRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the lifecycle knows about an available extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub extension: ExtensionRef,

    /// Human readable name
    pub label: Option<String>,

    /// Extensions that must be installed for this one to work
    pub dependencies: Vec<ExtensionRef>,

    /// Required extensions can never be uninstalled
    pub required: bool,
}

impl ExtensionInfo {
    pub fn new(extension: ExtensionRef) -> Self {
        Self {
            extension,
            label: None,
            dependencies: Vec::new(),
            required: false,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ExtensionRef>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Installs and uninstalls modules and themes
pub trait ExtensionLifecycle: Send + Sync {
    /// Install extensions of one kind, in the given order
    fn install(&self, kind: ExtensionKind, names: &[String]) -> Result<()>;

    /// Uninstall extensions of one kind, in the given order
    fn uninstall(&self, kind: ExtensionKind, names: &[String]) -> Result<()>;

    /// Every currently installed extension
    fn list_installed(&self) -> Result<BTreeSet<ExtensionRef>>;

    /// Look up an extension that could be installed; `None` if unknown
    fn info(&self, extension: &ExtensionRef) -> Result<Option<ExtensionInfo>>;
}
