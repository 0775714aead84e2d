//! Configuration importer
//!
//! The importer drives one import through a fixed sequence of states:
//!
//! ```text
//! Idle -> Validating -> Validated -> Initialized -> Processing -> Completed
//!              \                                        \
//!               `-> Failed                               `-> Failed
//! ```
//!
//! - [`ConfigImporter::validate`] compares the storages and runs the
//!   validation pipeline. It never mutates storage.
//! - [`ConfigImporter::initialize`] takes the import lock without blocking,
//!   checks that nothing changed since validation and computes the ordered
//!   steps.
//! - [`ConfigImporter::process_step`] executes exactly one step. Callers may
//!   stop between steps; there is no mid-step cancellation and no rollback
//!   of applied steps.
//!
//! The lock is released on completion, on the first failed step, on any
//! error during initialization, and when the importer is dropped.

use crate::comparer::{Changelist, ExtensionChangelist, StorageComparer};
use crate::dependency::DependencyResolver;
use crate::error::{ImportError, Result};
use crate::events::{EventEnvelope, ImportEvent};
use crate::ledger::ImportLedger;
use crate::lifecycle::ExtensionLifecycle;
use crate::lock::{LockBackend, LockGuard};
use crate::step::ImportStep;
use crate::validator::{ImportCheck, ValidationContext, ValidationPipeline};
use cfgsync_core::types::DEFAULT_LOCK_KEY;
use cfgsync_core::SchemaValidator;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where an importer is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImporterState {
    Idle,
    Validating,
    Validated,
    Initialized,
    Processing { completed: usize, total: usize },
    Completed,
    Failed,
}

impl ImporterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImporterState::Completed | ImporterState::Failed)
    }
}

impl fmt::Display for ImporterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImporterState::Idle => write!(f, "idle"),
            ImporterState::Validating => write!(f, "validating"),
            ImporterState::Validated => write!(f, "validated"),
            ImporterState::Initialized => write!(f, "initialized"),
            ImporterState::Processing { completed, total } => {
                write!(f, "processing ({}/{})", completed, total)
            }
            ImporterState::Completed => write!(f, "completed"),
            ImporterState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of an import as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    /// The storages were already in sync
    NoChanges,
    /// Nothing was changed; every validation error is listed
    ValidationFailed { errors: Vec<String> },
    /// Every step was applied
    Completed { steps: usize },
    /// Some steps were applied before one failed
    FailedMidway {
        /// Number of steps applied (the last applied step's number)
        completed: usize,
        total: usize,
        step: String,
        error: String,
    },
}

/// Imports a source storage into a target storage
pub struct ConfigImporter {
    comparer: StorageComparer,
    lock: Arc<dyn LockBackend>,
    lock_key: String,
    schemas: Option<Arc<SchemaValidator>>,
    lifecycle: Option<Arc<dyn ExtensionLifecycle>>,
    pipeline: ValidationPipeline,
    ledger: Option<ImportLedger>,

    run_id: String,
    state: ImporterState,
    errors: Vec<String>,
    extension_changes: ExtensionChangelist,
    steps: Vec<ImportStep>,
    position: usize,
    guard: Option<LockGuard>,
    started: Option<Instant>,
}

impl ConfigImporter {
    pub fn new(comparer: StorageComparer, lock: Arc<dyn LockBackend>) -> Self {
        Self {
            comparer,
            lock,
            lock_key: DEFAULT_LOCK_KEY.to_string(),
            schemas: None,
            lifecycle: None,
            pipeline: ValidationPipeline::with_defaults(),
            ledger: None,
            run_id: uuid::Uuid::new_v4().to_string(),
            state: ImporterState::Idle,
            errors: Vec::new(),
            extension_changes: ExtensionChangelist::default(),
            steps: Vec::new(),
            position: 0,
            guard: None,
            started: None,
        }
    }

    pub fn with_lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = key.into();
        self
    }

    /// Validate written documents against these schemas
    pub fn with_schemas(mut self, schemas: Arc<SchemaValidator>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Apply module and theme changes through this lifecycle
    ///
    /// Without a lifecycle extension changes are not computed.
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn ExtensionLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Replace the validation pipeline
    pub fn with_pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Append an extra check to the validation pipeline
    pub fn register_check(&mut self, check: Box<dyn ImportCheck>) {
        self.pipeline.register(check);
    }

    /// Record every transition in this ledger
    pub fn with_ledger(mut self, ledger: ImportLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> ImporterState {
        self.state
    }

    /// Validation or execution errors collected so far
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn comparer(&self) -> &StorageComparer {
        &self.comparer
    }

    pub fn changelist(&self) -> &Changelist {
        self.comparer.changelist()
    }

    pub fn extension_changelist(&self) -> &ExtensionChangelist {
        &self.extension_changes
    }

    /// Whether validation found anything to import
    pub fn has_changes(&self) -> bool {
        self.comparer.has_changes() || !self.extension_changes.is_empty()
    }

    /// Steps computed by `initialize`
    pub fn steps(&self) -> &[ImportStep] {
        &self.steps
    }

    /// Number of steps applied so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of the last applied step (1-based), if any
    pub fn last_completed(&self) -> Option<usize> {
        (self.position > 0).then_some(self.position)
    }

    /// The step `process_step` expects next
    pub fn next_step(&self) -> Option<&ImportStep> {
        match self.state {
            ImporterState::Initialized | ImporterState::Processing { .. } => {
                self.steps.get(self.position)
            }
            _ => None,
        }
    }

    /// Whether a different run currently holds the import lock
    pub fn already_importing(&self) -> Result<bool> {
        if self.guard.is_some() {
            return Ok(false);
        }
        self.lock.is_locked(&self.lock_key)
    }

    /// Compare the storages and validate the changelist
    ///
    /// Every error of every check is collected. On failure the importer is
    /// `Failed` and the full list is returned in [`ImportError::Validation`].
    pub fn validate(&mut self) -> Result<()> {
        match self.state {
            ImporterState::Idle | ImporterState::Validated => {}
            other => return Err(ImportError::invalid_state("validate", other)),
        }
        self.state = ImporterState::Validating;

        match self.run_validation() {
            Ok(errors) if errors.is_empty() => {
                info!(
                    "Validated {} configuration changes and {} extension changes",
                    self.comparer.changelist().len(),
                    self.extension_changes.install.len() + self.extension_changes.uninstall.len()
                );
                self.state = ImporterState::Validated;
                Ok(())
            }
            Ok(errors) => {
                warn!("Validation failed with {} error(s)", errors.len());
                self.errors = errors.clone();
                self.state = ImporterState::Failed;
                self.record(ImportEvent::ValidationFailed {
                    errors: errors.clone(),
                });
                Err(ImportError::validation(errors))
            }
            Err(e) => {
                self.errors = e.messages();
                self.state = ImporterState::Failed;
                Err(e)
            }
        }
    }

    fn run_validation(&mut self) -> Result<Vec<String>> {
        if !self.comparer.is_calculated() {
            self.comparer.create_changelist()?;
        }
        self.extension_changes = match &self.lifecycle {
            Some(lifecycle) => self.comparer.extension_changelist(lifecycle.as_ref())?,
            None => ExtensionChangelist::default(),
        };

        let lifecycle = self.lifecycle.as_deref();
        let resolver =
            DependencyResolver::from_comparer(&self.comparer, &self.extension_changes, lifecycle)?;
        let ctx = ValidationContext {
            comparer: &self.comparer,
            extension_changes: &self.extension_changes,
            lifecycle,
            schemas: self.schemas.as_deref(),
            resolver: &resolver,
        };
        Ok(self.pipeline.run(&ctx))
    }

    /// Take the lock and compute the ordered steps
    ///
    /// Fails with [`ImportError::LockContention`] without blocking if another
    /// import holds the lock, and with [`ImportError::StaleChangelist`] if a
    /// storage changed since validation. In both cases nothing is mutated and
    /// the lock is not held afterwards. With nothing to import the importer
    /// completes immediately and no steps are returned.
    pub fn initialize(&mut self) -> Result<&[ImportStep]> {
        if self.state != ImporterState::Validated {
            return Err(ImportError::invalid_state("initialize", self.state));
        }

        let guard = self
            .lock
            .try_acquire(&self.lock_key)?
            .ok_or_else(|| ImportError::LockContention {
                key: self.lock_key.clone(),
            })?;

        if self.comparer.is_stale()? {
            warn!("Storages changed since validation; the changelist must be recomputed");
            self.comparer.invalidate();
            self.state = ImporterState::Idle;
            return Err(ImportError::StaleChangelist);
        }

        let resolver = DependencyResolver::from_comparer(
            &self.comparer,
            &self.extension_changes,
            self.lifecycle.as_deref(),
        )?;
        let steps = resolver.resolve(self.comparer.changelist(), &self.extension_changes)?;

        self.steps = steps;
        self.position = 0;
        self.started = Some(Instant::now());

        if self.steps.is_empty() {
            info!("There are no changes to import");
            self.state = ImporterState::Completed;
            return Ok(&self.steps);
        }

        info!("Importing {} steps", self.steps.len());
        self.guard = Some(guard);
        self.state = ImporterState::Initialized;
        self.record(ImportEvent::ImportStarted {
            source: self.comparer.source().label(),
            target: self.comparer.target().label(),
            total_steps: self.steps.len(),
        });
        Ok(&self.steps)
    }

    /// Execute the next step
    ///
    /// `step` must equal the next unexecuted step. A failing step moves the
    /// importer to `Failed`, releases the lock and leaves earlier steps
    /// applied.
    pub fn process_step(&mut self, step: &ImportStep) -> Result<()> {
        let total = self.steps.len();
        let expected = match self.state {
            ImporterState::Initialized | ImporterState::Processing { .. } => {
                match self.steps.get(self.position) {
                    Some(expected) => expected,
                    None => return Err(ImportError::invalid_state("process a step", self.state)),
                }
            }
            other => return Err(ImportError::invalid_state("process a step", other)),
        };
        if expected != step {
            return Err(ImportError::OutOfOrderStep {
                expected: expected.to_string(),
                got: step.to_string(),
            });
        }

        let number = self.position + 1;
        debug!("Step {}/{}: {}", number, total, step);

        if let Err(message) = self.execute(step) {
            warn!("Step {}/{} ({}) failed: {}", number, total, step, message);
            self.errors.push(message.clone());
            self.state = ImporterState::Failed;
            self.guard = None;
            self.record(ImportEvent::StepFailed {
                number,
                step: step.to_string(),
                error_message: message.clone(),
            });
            self.record(ImportEvent::ImportFailed {
                completed_steps: self.position,
                total_steps: total,
                error_message: message.clone(),
                duration_ms: self.elapsed_ms(),
            });
            return Err(ImportError::StepFailed {
                number,
                total,
                step: step.to_string(),
                completed: self.position,
                message,
            });
        }

        self.position = number;
        self.record(ImportEvent::StepCompleted {
            number,
            step: step.to_string(),
        });

        if self.position == total {
            info!("Import completed: {} steps applied", total);
            self.state = ImporterState::Completed;
            self.guard = None;
            self.record(ImportEvent::ImportCompleted {
                steps: total,
                duration_ms: self.elapsed_ms(),
            });
        } else {
            self.state = ImporterState::Processing {
                completed: self.position,
                total,
            };
        }
        Ok(())
    }

    /// Execute the next step, returning it; `None` when none is left
    pub fn process_next(&mut self) -> Result<Option<ImportStep>> {
        let Some(step) = self.next_step().cloned() else {
            return Ok(None);
        };
        self.process_step(&step)?;
        Ok(Some(step))
    }

    /// Validate, initialize and process every step
    ///
    /// `progress` is called after each applied step with the step, the
    /// number of applied steps and the total. Lock contention and stale
    /// changelists are returned as errors; every other outcome is an
    /// [`ImportStatus`].
    pub fn run<F>(&mut self, mut progress: F) -> Result<ImportStatus>
    where
        F: FnMut(&ImportStep, usize, usize),
    {
        if self.state == ImporterState::Idle {
            match self.validate() {
                Ok(()) => {}
                Err(ImportError::Validation { errors }) => {
                    return Ok(ImportStatus::ValidationFailed { errors })
                }
                Err(e) => return Err(e),
            }
        }
        let total = self.initialize()?.len();
        if total == 0 {
            return Ok(ImportStatus::NoChanges);
        }

        loop {
            match self.process_next() {
                Ok(Some(step)) => progress(&step, self.position, total),
                Ok(None) => break,
                Err(ImportError::StepFailed {
                    completed,
                    total,
                    step,
                    message,
                    ..
                }) => {
                    return Ok(ImportStatus::FailedMidway {
                        completed,
                        total,
                        step,
                        error: message,
                    })
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ImportStatus::Completed { steps: total })
    }

    /// Classify the current state for callers
    pub fn status(&self) -> Option<ImportStatus> {
        match self.state {
            ImporterState::Completed if self.steps.is_empty() => Some(ImportStatus::NoChanges),
            ImporterState::Completed => Some(ImportStatus::Completed {
                steps: self.steps.len(),
            }),
            ImporterState::Failed if self.steps.is_empty() => {
                Some(ImportStatus::ValidationFailed {
                    errors: self.errors.clone(),
                })
            }
            ImporterState::Failed => Some(ImportStatus::FailedMidway {
                completed: self.position,
                total: self.steps.len(),
                step: self
                    .steps
                    .get(self.position)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                error: self.errors.last().cloned().unwrap_or_default(),
            }),
            _ => None,
        }
    }

    fn execute(&self, step: &ImportStep) -> std::result::Result<(), String> {
        let target = self.comparer.target();
        let source_data = |name: &str| {
            self.comparer
                .source_document(name)
                .ok_or_else(|| format!("{} is missing from the source snapshot", name))
        };

        match step {
            ImportStep::Create { name } | ImportStep::Update { name } => {
                let doc = source_data(name)?;
                target.write(name, doc.data()).map_err(|e| e.to_string())
            }
            ImportStep::Delete { name } => target.delete(name).map_err(|e| e.to_string()),
            ImportStep::Rename { from, to } => {
                let doc = source_data(to)?;
                target.write(to, doc.data()).map_err(|e| e.to_string())?;
                target.delete(from).map_err(|e| e.to_string())
            }
            ImportStep::Install { extension } => self
                .lifecycle()?
                .install(extension.kind, std::slice::from_ref(&extension.name))
                .map_err(|e| format!("{:#}", e)),
            ImportStep::Uninstall { extension } => self
                .lifecycle()?
                .uninstall(extension.kind, std::slice::from_ref(&extension.name))
                .map_err(|e| format!("{:#}", e)),
        }
    }

    fn lifecycle(&self) -> std::result::Result<&dyn ExtensionLifecycle, String> {
        self.lifecycle
            .as_deref()
            .ok_or_else(|| "no extension lifecycle is configured".to_string())
    }

    fn elapsed_ms(&self) -> u64 {
        self.started
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or_default()
    }

    fn record(&self, event: ImportEvent) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(e) = ledger.append(&EventEnvelope::new(&self.run_id, event)) {
            warn!("Failed to record import event: {:#}", e);
        }
    }
}
