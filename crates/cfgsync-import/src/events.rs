use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Import lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportEvent {
    /// Validation rejected the changelist; nothing was changed
    ValidationFailed { errors: Vec<String> },

    /// The lock was taken and steps were computed
    ImportStarted {
        source: String,
        target: String,
        total_steps: usize,
    },

    /// A step was applied
    StepCompleted { number: usize, step: String },

    /// A step failed
    StepFailed {
        number: usize,
        step: String,
        error_message: String,
    },

    /// Every step was applied
    ImportCompleted { steps: usize, duration_ms: u64 },

    /// The import stopped before all steps were applied
    ImportFailed {
        completed_steps: usize,
        total_steps: usize,
        error_message: String,
        duration_ms: u64,
    },
}

impl ImportEvent {
    /// Event type name for display
    pub fn type_name(&self) -> &'static str {
        match self {
            ImportEvent::ValidationFailed { .. } => "validation_failed",
            ImportEvent::ImportStarted { .. } => "import_started",
            ImportEvent::StepCompleted { .. } => "step_completed",
            ImportEvent::StepFailed { .. } => "step_failed",
            ImportEvent::ImportCompleted { .. } => "import_completed",
            ImportEvent::ImportFailed { .. } => "import_failed",
        }
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        match self {
            ImportEvent::ValidationFailed { errors } => {
                format!("validation failed with {} error(s)", errors.len())
            }
            ImportEvent::ImportStarted {
                source,
                target,
                total_steps,
            } => format!("{} steps from {} to {}", total_steps, source, target),
            ImportEvent::StepCompleted { number, step } => format!("#{} {}", number, step),
            ImportEvent::StepFailed {
                number,
                step,
                error_message,
            } => format!("#{} {}: {}", number, step, error_message),
            ImportEvent::ImportCompleted { steps, duration_ms } => {
                format!("{} steps in {} ms", steps, duration_ms)
            }
            ImportEvent::ImportFailed {
                completed_steps,
                total_steps,
                error_message,
                ..
            } => format!(
                "{} of {} steps applied: {}",
                completed_steps, total_steps, error_message
            ),
        }
    }
}

/// Event metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID (UUID v4)
    pub event_id: String,

    /// Event timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Import run the event belongs to
    pub run_id: String,

    /// Version of the library that published the event
    pub cli_version: String,

    /// The actual event payload
    pub event: ImportEvent,
}

impl EventEnvelope {
    pub fn new(run_id: impl Into<String>, event: ImportEvent) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            run_id: run_id.into(),
            cli_version: env!("CARGO_PKG_VERSION").to_string(),
            event,
        }
    }
}
