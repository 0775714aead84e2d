//! Import command

use anyhow::Result;
use camino::Utf8Path;
use cfgsync_import::{ConfigImporter, ImportError};
use dialoguer::Confirm;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{exit, EXIT_FAILED_MIDWAY, EXIT_INTERRUPTED, EXIT_LOCKED, EXIT_VALIDATION};
use crate::cli::ImportArgs;
use crate::context::Workspace;
use crate::output;

/// Import the sync storage into the active storage
pub async fn run(args: ImportArgs, config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;
    let importer = workspace.importer()?;
    execute(importer, args.yes).await
}

/// Validate, confirm and apply every step of `importer`
///
/// Shared with `import-single`. Ctrl-C stops the import between steps;
/// steps already applied stay applied.
pub(crate) async fn execute(mut importer: ConfigImporter, yes: bool) -> Result<ExitCode> {
    match importer.validate() {
        Ok(()) => {}
        Err(ImportError::Validation { errors }) => {
            output::error_list("There were errors validating the configuration:", &errors);
            return Ok(exit(EXIT_VALIDATION));
        }
        Err(e) => return Err(e.into()),
    }

    if !importer.has_changes() {
        output::success("There are no changes to import");
        return Ok(ExitCode::SUCCESS);
    }

    if !yes {
        let changelist = importer.changelist();
        let extensions = importer.extension_changelist();
        output::info(&format!(
            "This will create {}, update {}, delete {} and rename {} configuration(s), install {} and uninstall {} extension(s)",
            changelist.create.len(),
            changelist.update.len(),
            changelist.delete.len(),
            changelist.rename.len(),
            extensions.install.len(),
            extensions.uninstall.len(),
        ));

        let confirmed = Confirm::new()
            .with_prompt("Continue with import?")
            .default(false)
            .interact()?;

        if !confirmed {
            output::info("Import cancelled");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let total = match importer.initialize() {
        Ok(steps) => steps.len(),
        Err(ImportError::LockContention { .. }) => {
            output::error("Another request may be importing configuration already");
            return Ok(exit(EXIT_LOCKED));
        }
        Err(e) => return Err(e.into()),
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let pb = output::progress_bar(total as u64, "Importing");
    let code = loop {
        let Some(step) = importer.next_step().cloned() else {
            pb.finish_with_message("Import complete");
            output::success(&format!("Imported {} step(s)", total));
            break ExitCode::SUCCESS;
        };

        if interrupted.load(Ordering::SeqCst) {
            pb.abandon_with_message("Interrupted");
            output::warning(&format!(
                "Import interrupted after {} of {} steps; applied steps were kept",
                importer.position(),
                total
            ));
            break exit(EXIT_INTERRUPTED);
        }

        pb.set_message(step.to_string());
        match importer.process_step(&step) {
            Ok(()) => pb.set_position(importer.position() as u64),
            Err(e @ ImportError::StepFailed { .. }) => {
                pb.abandon_with_message("Failed");
                output::error(&e.to_string());
                match importer.last_completed() {
                    Some(number) => output::info(&format!(
                        "Last completed step: #{} ({})",
                        number,
                        importer.steps()[number - 1]
                    )),
                    None => output::info("No steps were applied"),
                }
                break exit(EXIT_FAILED_MIDWAY);
            }
            Err(e) => {
                pb.abandon();
                watcher.abort();
                return Err(e.into());
            }
        }
    };

    watcher.abort();
    Ok(code)
}
