//! Preview command

use anyhow::{Context, Result};
use camino::Utf8Path;
use cfgsync_import::{
    Changelist, DependencyResolver, ExtensionChangelist, ExtensionLifecycle, ImportStep,
};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::PreviewArgs;
use crate::context::Workspace;
use crate::output;

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "#")]
    number: usize,
    operation: String,
    subject: String,
}

#[derive(Serialize)]
struct PreviewReport<'a> {
    changelist: &'a Changelist,
    extensions: &'a ExtensionChangelist,
    /// Execution order; absent when dependencies form a cycle
    steps: Option<&'a [ImportStep]>,
}

/// Show the changes an import would apply, in execution order
pub async fn run(args: PreviewArgs, config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;
    let lifecycle: Arc<dyn ExtensionLifecycle> = workspace.lifecycle()?;

    let mut comparer = workspace.comparer();
    comparer
        .create_changelist()
        .context("Failed to compare storages")?;
    let extensions = comparer.extension_changelist(lifecycle.as_ref())?;

    let resolver =
        DependencyResolver::from_comparer(&comparer, &extensions, Some(lifecycle.as_ref()))?;
    let steps = resolver.resolve(comparer.changelist(), &extensions);

    if args.json {
        let report = PreviewReport {
            changelist: comparer.changelist(),
            extensions: &extensions,
            steps: steps.as_deref().ok(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    if !comparer.has_changes() && extensions.is_empty() {
        output::success("There are no changes to import");
        return Ok(ExitCode::SUCCESS);
    }

    output::header(&format!(
        "Changes from {} to {}",
        comparer.source().label(),
        comparer.target().label()
    ));
    let changelist = comparer.changelist();
    output::kv("Create", &changelist.create.len().to_string());
    output::kv("Update", &changelist.update.len().to_string());
    output::kv("Delete", &changelist.delete.len().to_string());
    output::kv("Rename", &changelist.rename.len().to_string());
    output::kv("Install", &extensions.install.len().to_string());
    output::kv("Uninstall", &extensions.uninstall.len().to_string());
    println!();

    match steps {
        Ok(steps) => {
            let rows: Vec<ChangeRow> = steps
                .iter()
                .enumerate()
                .map(|(i, step)| ChangeRow {
                    number: i + 1,
                    operation: step.operation().to_string(),
                    subject: step.subject(),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);
        }
        Err(e) => {
            output::error_list("The changes cannot be ordered", &e.messages());
        }
    }

    Ok(ExitCode::SUCCESS)
}
