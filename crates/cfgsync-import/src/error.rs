//! Error types for cfgsync-import

use thiserror::Error;

/// Result type alias using cfgsync-import's error type
pub type Result<T> = std::result::Result<T, ImportError>;

/// Errors raised while comparing, validating or importing configuration
#[derive(Error, Debug)]
pub enum ImportError {
    /// The changelist failed validation; nothing was changed
    #[error("There were errors validating the configuration:\n{}", .errors.join("\n"))]
    Validation { errors: Vec<String> },

    /// Another import holds the lock
    #[error("Another request may be importing configuration already (lock '{key}' is held)")]
    LockContention { key: String },

    /// The lock backend itself failed
    #[error("Failed to acquire lock '{key}': {message}")]
    Lock { key: String, message: String },

    /// A step failed; later steps were not executed
    #[error("Step {number} of {total} ({step}) failed: {message}")]
    StepFailed {
        /// 1-based number of the failed step
        number: usize,
        total: usize,
        step: String,
        /// Number of steps applied before the failure
        completed: usize,
        message: String,
    },

    /// The operation is not allowed in the importer's current state
    #[error("Cannot {action} while the importer is {state}")]
    InvalidState { action: &'static str, state: String },

    /// A storage changed between validation and initialization
    #[error("The configuration changed after it was validated; validate it again")]
    StaleChangelist,

    /// The caller passed a step other than the next one
    #[error("Expected step '{expected}' but was asked to process '{got}'")]
    OutOfOrderStep { expected: String, got: String },

    /// Dependencies form one or more cycles
    #[error("Dependency cycle detected: {}", .cycles.join("; "))]
    DependencyCycle { cycles: Vec<String> },

    /// The extension lifecycle collaborator failed outside a step
    #[error("Extension lifecycle error: {message}")]
    Lifecycle { message: String },

    /// Storage error
    #[error(transparent)]
    Storage(#[from] cfgsync_core::Error),
}

impl ImportError {
    /// Create a validation error from the collected messages
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &'static str, state: impl ToString) -> Self {
        Self::InvalidState {
            action,
            state: state.to_string(),
        }
    }

    /// Wrap an opaque collaborator error
    pub fn lifecycle(err: anyhow::Error) -> Self {
        Self::Lifecycle {
            message: format!("{:#}", err),
        }
    }

    /// Every message a caller should show for this error
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation { errors } => errors.clone(),
            Self::DependencyCycle { cycles } => cycles
                .iter()
                .map(|c| format!("Dependency cycle detected among: {}", c))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}
