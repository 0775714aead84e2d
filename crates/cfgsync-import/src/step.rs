//! Units of import work

use cfgsync_core::types::ExtensionRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of an import
///
/// Steps are executed strictly in the order the resolver produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ImportStep {
    /// Write a document that does not exist in the target
    Create { name: String },
    /// Overwrite a document with the source content
    Update { name: String },
    /// Remove a document from the target
    Delete { name: String },
    /// Move a document to a new name, writing the source content
    Rename { from: String, to: String },
    /// Install a module or theme
    Install { extension: ExtensionRef },
    /// Uninstall a module or theme
    Uninstall { extension: ExtensionRef },
}

impl ImportStep {
    /// Short operation name
    pub fn operation(&self) -> &'static str {
        match self {
            ImportStep::Create { .. } => "create",
            ImportStep::Update { .. } => "update",
            ImportStep::Delete { .. } => "delete",
            ImportStep::Rename { .. } => "rename",
            ImportStep::Install { .. } => "install",
            ImportStep::Uninstall { .. } => "uninstall",
        }
    }

    /// What the step acts on
    pub fn subject(&self) -> String {
        match self {
            ImportStep::Create { name }
            | ImportStep::Update { name }
            | ImportStep::Delete { name } => name.clone(),
            ImportStep::Rename { from, to } => format!("{} -> {}", from, to),
            ImportStep::Install { extension } | ImportStep::Uninstall { extension } => {
                extension.to_string()
            }
        }
    }

    /// Config name this step writes or deletes, if any
    pub fn config_name(&self) -> Option<&str> {
        match self {
            ImportStep::Create { name }
            | ImportStep::Update { name }
            | ImportStep::Delete { name } => Some(name),
            ImportStep::Rename { to, .. } => Some(to),
            ImportStep::Install { .. } | ImportStep::Uninstall { .. } => None,
        }
    }

    pub fn is_extension_step(&self) -> bool {
        matches!(self, ImportStep::Install { .. } | ImportStep::Uninstall { .. })
    }
}

impl fmt::Display for ImportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation(), self.subject())
    }
}
