//! Import ledger
//!
//! Every importer transition is appended as one JSON line to
//! `<state-dir>/import_log.jsonl`. Appends hold an exclusive file lock so
//! concurrent processes never interleave lines.

use crate::events::{EventEnvelope, ImportEvent};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};

/// Default number of events shown by `log`
pub const DEFAULT_LOG_TAIL_LINES: usize = 25;

/// How a run ended, as far as the ledger knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Started but no terminal event recorded
    InProgress,
    Completed,
    Failed,
    ValidationFailed,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::InProgress => write!(f, "in progress"),
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Failed => write!(f, "failed"),
            RunOutcome::ValidationFailed => write!(f, "validation failed"),
        }
    }
}

/// Summary of one import run derived from its events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: RunOutcome,
    pub completed_steps: usize,
    pub total_steps: Option<usize>,
    pub error: Option<String>,
}

impl RunSummary {
    fn start(envelope: &EventEnvelope) -> Self {
        Self {
            run_id: envelope.run_id.clone(),
            started_at: envelope.timestamp,
            finished_at: None,
            outcome: RunOutcome::InProgress,
            completed_steps: 0,
            total_steps: None,
            error: None,
        }
    }

    fn apply(&mut self, envelope: &EventEnvelope) {
        match &envelope.event {
            ImportEvent::ValidationFailed { errors } => {
                self.outcome = RunOutcome::ValidationFailed;
                self.finished_at = Some(envelope.timestamp);
                self.error = errors.first().cloned();
            }
            ImportEvent::ImportStarted { total_steps, .. } => {
                self.total_steps = Some(*total_steps);
            }
            ImportEvent::StepCompleted { number, .. } => {
                self.completed_steps = *number;
            }
            ImportEvent::StepFailed { error_message, .. } => {
                self.error = Some(error_message.clone());
            }
            ImportEvent::ImportCompleted { steps, .. } => {
                self.outcome = RunOutcome::Completed;
                self.completed_steps = *steps;
                self.finished_at = Some(envelope.timestamp);
            }
            ImportEvent::ImportFailed {
                completed_steps,
                error_message,
                ..
            } => {
                self.outcome = RunOutcome::Failed;
                self.completed_steps = *completed_steps;
                self.finished_at = Some(envelope.timestamp);
                self.error = Some(error_message.clone());
            }
        }
    }
}

/// JSON-lines import ledger
#[derive(Debug, Clone)]
pub struct ImportLedger {
    ledger_path: Utf8PathBuf,
}

impl ImportLedger {
    /// Create ledger from custom path
    pub fn new(ledger_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.ledger_path
    }

    /// Append event to ledger (atomic, file-locked)
    pub fn append(&self, event: &EventEnvelope) -> Result<()> {
        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent).context("Failed to create ledger parent directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.ledger_path)
            .context("Failed to open ledger file")?;

        // Released when `file` is dropped
        file.lock_exclusive()
            .context("Failed to acquire exclusive lock on ledger")?;

        let json_line = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(file, "{}", json_line).context("Failed to write event to ledger")?;
        file.sync_all().context("Failed to sync ledger file")?;

        Ok(())
    }

    /// Every event, oldest first
    pub fn events(&self) -> Result<Vec<EventEnvelope>> {
        if !self.ledger_path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.ledger_path).context("Failed to open ledger file")?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line.context("Failed to read line from ledger")?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope: EventEnvelope =
                serde_json::from_str(&line).context("Failed to deserialize event from ledger")?;
            events.push(envelope);
        }

        Ok(events)
    }

    /// The most recent events in chronological order
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<EventEnvelope>> {
        let mut events = self.events()?;
        if let Some(limit) = limit {
            if events.len() > limit {
                events = events.split_off(events.len() - limit);
            }
        }
        Ok(events)
    }

    /// Events of one run in chronological order
    pub fn run_events(&self, run_id: &str) -> Result<Vec<EventEnvelope>> {
        Ok(self
            .events()?
            .into_iter()
            .filter(|e| e.run_id == run_id)
            .collect())
    }

    /// One summary per run, ordered by start time
    pub fn runs(&self) -> Result<Vec<RunSummary>> {
        let mut runs: Vec<RunSummary> = Vec::new();
        for envelope in self.events()? {
            let position = runs.iter().position(|r| r.run_id == envelope.run_id);
            let run = match position {
                Some(i) => &mut runs[i],
                None => {
                    runs.push(RunSummary::start(&envelope));
                    let last = runs.len() - 1;
                    &mut runs[last]
                }
            };
            run.apply(&envelope);
        }
        runs.sort_by_key(|r| r.started_at);
        Ok(runs)
    }
}
