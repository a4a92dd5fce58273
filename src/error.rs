//! Error types for the task board

use std::path::PathBuf;

use thiserror::Error;

/// Result type for task store operations
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors raised by task store operations
#[derive(Debug, Error)]
pub enum TaskError {
    /// A field failed validation; nothing was changed
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// No task carries the given id
    #[error("task {id} not found")]
    NotFound { id: u64 },

    #[error("unknown status: {0}")]
    InvalidStatus(String),

    #[error("unknown priority: {0}")]
    InvalidPriority(String),

    /// Every id the counter can hand out has been used
    #[error("no task ids left to assign")]
    IdsExhausted,

    /// The task file could not be read or set aside, so nothing is written this session
    #[error("tasks are read-only this session: {reason}")]
    ReadOnly { reason: String },

    /// Reading or writing the persistence store failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TaskError {
    /// Create a validation error
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from the key-value persistence store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Keys map to file names, so only a safe subset is allowed
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Errors loading `config.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
