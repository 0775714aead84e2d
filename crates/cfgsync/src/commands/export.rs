//! Export command

use anyhow::{Context, Result};
use camino::Utf8Path;
use cfgsync_core::copy_all;
use dialoguer::Confirm;
use std::process::ExitCode;

use crate::cli::ExportArgs;
use crate::context::Workspace;
use crate::output;

/// Replace the sync storage with the content of the active storage
pub async fn run(args: ExportArgs, config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;

    if !args.yes {
        output::warning(&format!(
            "This will overwrite {} with {}",
            workspace.sync.label(),
            workspace.active.label()
        ));
        let confirmed = Confirm::new()
            .with_prompt("Continue with export?")
            .default(false)
            .interact()?;

        if !confirmed {
            output::info("Export cancelled");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let spinner = output::spinner("Exporting configuration...");
    let copied = copy_all(workspace.active.as_ref(), workspace.sync.as_ref())
        .context("Failed to export configuration")?;
    spinner.finish_and_clear();

    output::success(&format!(
        "Exported {} configuration(s) to {}",
        copied,
        workspace.sync.label()
    ));
    Ok(ExitCode::SUCCESS)
}
