//! Single-item import command

use anyhow::{anyhow, Context, Result};
use camino::Utf8Path;
use cfgsync_import::{ImportError, SingleImport, SingleImportTarget};
use std::process::ExitCode;

use super::{exit, import, EXIT_VALIDATION};
use crate::cli::ImportSingleArgs;
use crate::context::Workspace;
use crate::output;

/// Import one YAML document into the active storage
pub async fn run(args: ImportSingleArgs, config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;
    let yaml = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file))?;

    let target = match (&args.name, &args.entity_type) {
        (Some(name), _) => SingleImportTarget::Simple { name: name.clone() },
        (None, Some(id)) => {
            let entity_type = workspace.settings.entity_type(id).ok_or_else(|| {
                anyhow!(
                    "Unknown entity type '{}'; declare it under entity-types in cfgsync.yaml",
                    id
                )
            })?;
            SingleImportTarget::Entity {
                entity_type: entity_type.clone(),
                custom_id: args.id.clone(),
            }
        }
        (None, None) => return Err(anyhow!("Either --name or --type is required")),
    };

    let prepared = match SingleImport::new(workspace.active.clone()).prepare(&target, &yaml) {
        Ok(prepared) => prepared,
        Err(ImportError::Validation { errors }) => {
            output::error_list("The configuration cannot be imported:", &errors);
            return Ok(exit(EXIT_VALIDATION));
        }
        Err(e) => return Err(e.into()),
    };

    if prepared.exists() {
        output::info(&format!("{} will be replaced", prepared.name()));
    } else {
        output::info(&format!("{} will be created", prepared.name()));
    }

    let importer = workspace
        .configure(prepared.into_importer(workspace.lock()))?
        .with_ledger(workspace.ledger());
    import::execute(importer, args.yes).await
}
