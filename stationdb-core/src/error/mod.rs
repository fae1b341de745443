//! Core error types for StationDB

use thiserror::Error;

/// How a caller should surface an error to the user.
///
/// Lookups that find a deleted data set, lock contention and user
/// cancellation are reported as warnings; everything else is a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Main error type for StationDB operations
#[derive(Error, Debug)]
pub enum StationDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {context}: {message}")]
    Database { context: String, message: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    /// A concrete key is absent from the registry even after a forced refresh.
    /// Index rows are never physically deleted, so this means the persisted
    /// index is inconsistent.
    #[error("Invalid data set key {key} in root database '{root}'")]
    InvalidKey { root: String, key: i32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data set {key} has been deleted")]
    Deleted { key: i32 },

    #[error("Data set is in use: {0}")]
    Busy(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Malformed record in {file} at line {line}: {message}")]
    MalformedRecord {
        file: String,
        line: u64,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for StationDB operations
pub type StationDbResult<T> = Result<T, StationDbError>;

impl StationDbError {
    /// Wrap a lower-level database failure with what was being attempted.
    pub fn database(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StationDbError::Database {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StationDbError::NotFound(_)
            | StationDbError::Deleted { .. }
            | StationDbError::Busy(_)
            | StationDbError::Cancelled => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Lock contention clears once the holder releases; nothing else is worth
    /// retrying without user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StationDbError::Busy(_))
    }
}

// Conversion implementations for common error types
impl From<serde_json::Error> for StationDbError {
    fn from(err: serde_json::Error) -> Self {
        StationDbError::Serialization(err.to_string())
    }
}
