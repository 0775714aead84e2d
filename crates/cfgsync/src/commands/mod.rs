//! CLI command implementations

pub mod export;
pub mod import;
pub mod import_single;
pub mod log;
pub mod preview;
pub mod show;
pub mod status;
pub mod validate;

use std::process::ExitCode;

/// Validation rejected the changes; nothing was written
pub const EXIT_VALIDATION: u8 = 2;

/// Another import holds the lock
pub const EXIT_LOCKED: u8 = 3;

/// Some steps were applied before one failed
pub const EXIT_FAILED_MIDWAY: u8 = 4;

/// Stopped by Ctrl-C between steps
pub const EXIT_INTERRUPTED: u8 = 130;

pub(crate) fn exit(code: u8) -> ExitCode {
    ExitCode::from(code)
}
