//! Error types for cfgsync-core

use thiserror::Error;

/// Result type alias using cfgsync-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for cfgsync
#[derive(Error, Debug)]
pub enum Error {
    /// Settings file not found
    #[error("Settings file not found: {path}")]
    SettingsNotFound { path: String },

    /// Invalid settings
    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    /// Config document not found in a storage
    #[error("Configuration not found: {name}")]
    NotFound { name: String },

    /// Config name violates the naming rules
    #[error("Invalid configuration name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Document content could not be decoded or is not a mapping
    #[error("Invalid configuration data for {name}: {message}")]
    InvalidData { name: String, message: String },

    /// Storage refused a write or delete
    #[error("Failed to write configuration {name}: {message}")]
    Write { name: String, message: String },

    /// Storage does not accept mutations
    #[error("Storage is read-only: {storage}")]
    ReadOnly { storage: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Schema validation error
    #[error("Schema validation failed:\n{errors}")]
    SchemaValidation { errors: String },

    /// Schema not found
    #[error("Schema not found: {name}")]
    SchemaNotFound { name: String },

    /// Database backend error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a settings not found error
    pub fn settings_not_found(path: impl Into<String>) -> Self {
        Self::SettingsNotFound { path: path.into() }
    }

    /// Create an invalid settings error
    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidData {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a write error
    pub fn write(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a read-only storage error
    pub fn read_only(storage: impl Into<String>) -> Self {
        Self::ReadOnly {
            storage: storage.into(),
        }
    }

    /// Create a schema validation error from a list of errors
    pub fn schema_validation(errors: Vec<String>) -> Self {
        Self::SchemaValidation {
            errors: errors.join("\n"),
        }
    }

    /// Create a schema not found error
    pub fn schema_not_found(name: impl Into<String>) -> Self {
        Self::SchemaNotFound { name: name.into() }
    }

    /// True when the error means the named document does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
