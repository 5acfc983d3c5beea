//! Core error types for timeanchor-core.
//!
//! Data sparsity (no events, no tasks, no gaps) and oracle outages are not
//! errors: they resolve to a well-formed, possibly empty, assignment result.
//! What remains here are contract violations, configuration problems and
//! cancellation.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Core error type for timeanchor-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Contract violations in caller-supplied data
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Scoring oracle errors that were not absorbed by a fallback
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// A calendar or task source failed to produce its input
    #[error("Source error for '{source_name}': {message}")]
    Source {
        source_name: String,
        message: String,
    },

    /// The run was cancelled before an assignment could be produced
    #[error("Anchoring run cancelled during {stage}; no assignment was produced")]
    Cancelled { stage: &'static str },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    /// Build a [`CoreError::Source`] from any displayable error.
    pub fn source(source_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CoreError::Source {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error means the run was abandoned rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled { .. })
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// No home directory to place the config under
    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

/// Contract violations. These are defects in the caller, not runtime
/// conditions, and are never silently tolerated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range for '{id}': end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Task with a zero or negative duration
    #[error("Task '{task_id}' has a non-positive duration of {minutes} minutes")]
    NonPositiveDuration { task_id: String, minutes: i64 },

    /// Same id used twice within one catalog
    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    /// A score references a task that is not in the catalog
    #[error("Score references unknown task '{0}'")]
    UnknownTask(String),

    /// A score references a slot that is not in the catalog
    #[error("Score references unknown slot '{0}'")]
    UnknownSlot(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Scoring oracle failures. The semantic scorer turns every one of these
/// into the neutral fallback score.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The call did not finish within its budget
    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    /// The oracle cannot be reached or is not configured
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure
    #[error("Oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response did not match the expected schema
    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
