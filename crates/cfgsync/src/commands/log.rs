//! Import log command

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::process::ExitCode;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::LogArgs;
use crate::context::Workspace;
use crate::output;

#[derive(Tabled)]
struct EventRow {
    time: String,
    run: String,
    event: String,
    details: String,
}

#[derive(Tabled)]
struct RunRow {
    run: String,
    started: String,
    outcome: String,
    steps: String,
    error: String,
}

/// Show recent import events or per-run summaries
pub async fn run(args: LogArgs, config: Option<&Utf8Path>) -> Result<ExitCode> {
    let workspace = Workspace::load(config)?;
    let ledger = workspace.ledger();

    if args.runs {
        let runs = ledger.runs().context("Failed to read import log")?;
        let skip = runs.len().saturating_sub(args.limit);
        let runs = &runs[skip..];

        if args.json {
            for run in runs {
                println!("{}", serde_json::to_string(run)?);
            }
            return Ok(ExitCode::SUCCESS);
        }
        if runs.is_empty() {
            output::info("No imports recorded");
            return Ok(ExitCode::SUCCESS);
        }

        let rows: Vec<RunRow> = runs
            .iter()
            .map(|run| RunRow {
                run: short_id(&run.run_id),
                started: run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                outcome: run.outcome.to_string(),
                steps: match run.total_steps {
                    Some(total) => format!("{}/{}", run.completed_steps, total),
                    None => "-".to_string(),
                },
                error: run.error.clone().unwrap_or_else(|| "-".to_string()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
        return Ok(ExitCode::SUCCESS);
    }

    let events = ledger
        .history(Some(args.limit))
        .context("Failed to read import log")?;

    if args.json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(ExitCode::SUCCESS);
    }
    if events.is_empty() {
        output::info("No imports recorded");
        return Ok(ExitCode::SUCCESS);
    }

    let rows: Vec<EventRow> = events
        .iter()
        .map(|envelope| EventRow {
            time: envelope.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            run: short_id(&envelope.run_id),
            event: envelope.event.type_name().to_string(),
            details: envelope.event.summary(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(ExitCode::SUCCESS)
}

fn short_id(run_id: &str) -> String {
    run_id.chars().take(8).collect()
}
