//! Status command

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::process::ExitCode;

use crate::context::Workspace;
use crate::output;

/// Show storages, pending changes, the lock and the last import
pub async fn run(config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;
    let settings = &workspace.settings;

    output::header("Storages");
    output::kv("Active", &workspace.active.label());
    output::kv(
        "Active documents",
        &workspace.active.list_all("")?.len().to_string(),
    );
    output::kv("Sync", &workspace.sync.label());
    output::kv(
        "Sync documents",
        &workspace.sync.list_all("")?.len().to_string(),
    );
    output::kv("State directory", settings.state_dir.as_str());

    let mut comparer = workspace.comparer();
    let changelist = comparer
        .create_changelist()
        .context("Failed to compare storages")?;
    output::header("Pending changes");
    if changelist.has_changes() {
        output::kv("Create", &changelist.create.len().to_string());
        output::kv("Update", &changelist.update.len().to_string());
        output::kv("Delete", &changelist.delete.len().to_string());
        output::kv("Rename", &changelist.rename.len().to_string());
    } else {
        println!("  none");
    }

    output::header("Import");
    let locked = workspace.lock().is_locked(&settings.import.lock_key)?;
    output::kv("Lock", if locked { "held" } else { "free" });

    let runs = workspace.ledger().runs().context("Failed to read import log")?;
    match runs.last() {
        Some(run) => {
            output::kv(
                "Last run",
                &run.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
            output::kv("Outcome", &run.outcome.to_string());
            let steps = match run.total_steps {
                Some(total) => format!("{}/{}", run.completed_steps, total),
                None => run.completed_steps.to_string(),
            };
            output::kv("Steps", &steps);
            if let Some(error) = &run.error {
                output::kv("Error", error);
            }
        }
        None => output::kv("Last run", "never"),
    }

    Ok(ExitCode::SUCCESS)
}
