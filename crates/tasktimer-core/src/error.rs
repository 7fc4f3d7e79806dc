//! Core error types for tasktimer-core.
//!
//! All fallible operations in the library return [`CoreError`] (via the
//! [`Result`] alias) or one of the narrower enums it wraps.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tasktimer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Alarm presentation errors
    #[error("Alarm error: {0}")]
    Alarm(#[from] AlarmError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Data directory could not be created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[source] std::io::Error),
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors, surfaced to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Algorithm name was empty after trimming
    #[error("Enter an algorithm name")]
    EmptyName,

    /// Another algorithm already uses this name
    #[error("Algorithm '{name}' already exists")]
    DuplicateAlgorithm { name: String },

    /// No algorithm with this name
    #[error("Unknown algorithm '{name}'")]
    UnknownAlgorithm { name: String },

    /// Task number already taken
    #[error("Task number {number} already exists")]
    DuplicateTaskNumber { number: u32 },

    /// No task with this number
    #[error("Unknown task {number}")]
    UnknownTask { number: u32 },

    /// Task is already being timed
    #[error("Task {number} is already running")]
    AlreadyRunning { number: u32 },

    /// Task is not being timed
    #[error("Task {number} is not running")]
    NotRunning { number: u32 },

    /// Out of bounds
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },
}

/// Alarm presentation errors.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// The presentation surface is not available (e.g. no terminal).
    #[error("Alarm surface unavailable: {0}")]
    Unavailable(String),

    /// Writing the alarm failed
    #[error("Failed to present alarm: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
