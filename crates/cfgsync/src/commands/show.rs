//! Show command

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::process::ExitCode;

use crate::cli::ShowArgs;
use crate::context::Workspace;

/// Print one document as YAML
pub async fn run(args: ShowArgs, config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;
    let storage = if args.sync {
        &workspace.sync
    } else {
        &workspace.active
    };

    let doc = storage
        .read(&args.name)
        .with_context(|| format!("Failed to read {} from {}", args.name, storage.label()))?;
    print!("{}", doc.to_yaml()?);
    Ok(ExitCode::SUCCESS)
}
