//! Validate command

use anyhow::Result;
use camino::Utf8Path;
use cfgsync_import::ImportError;
use std::process::ExitCode;

use super::{exit, EXIT_VALIDATION};
use crate::context::Workspace;
use crate::output;

/// Run every validation check against the pending changes
pub async fn run(config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;
    let mut importer = workspace.importer()?;

    match importer.validate() {
        Ok(()) if !importer.has_changes() => {
            output::success("There are no changes to import");
            Ok(ExitCode::SUCCESS)
        }
        Ok(()) => {
            let changes = importer.changelist().len()
                + importer.extension_changelist().install.len()
                + importer.extension_changelist().uninstall.len();
            output::success(&format!("{} pending change(s) are valid", changes));
            Ok(ExitCode::SUCCESS)
        }
        Err(ImportError::Validation { errors }) => {
            output::error_list(
                "There were errors validating the configuration:",
                &errors,
            );
            Ok(exit(EXIT_VALIDATION))
        }
        Err(e) => Err(e.into()),
    }
}
