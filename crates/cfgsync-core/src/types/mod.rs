//! Type definitions for cfgsync documents, extensions and settings

mod document;
mod extension;
mod settings;

pub use document::*;
pub use extension::*;
pub use settings::*;
