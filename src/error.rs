//! Structured error types for store, index, and sync operations.

use serde::Serialize;
use std::path::PathBuf;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Lookup errors
    NotFound,
    OutOfRange,

    // Input errors
    ParseFailed,
    DecodeFailed,
    ValidationFailed,
    InvalidConfig,

    // Internal errors
    IoError,
    DatabaseError,
    MigrationError,
    IndexClosed,
}

/// Errors raised by the note stores, the task index, and the synchronizer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8", path.display())]
    Decode { path: PathBuf },

    #[error("malformed note: {0}")]
    Parse(String),

    #[error("project {} is no longer valid: {reason}", path.display())]
    Validation { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] refinery::Error),

    #[error("task index is closed")]
    Closed,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::OutOfRange { .. } => ErrorCode::OutOfRange,
            Error::Io { .. } => ErrorCode::IoError,
            Error::Decode { .. } => ErrorCode::DecodeFailed,
            Error::Parse(_) => ErrorCode::ParseFailed,
            Error::Validation { .. } => ErrorCode::ValidationFailed,
            Error::Config(_) => ErrorCode::InvalidConfig,
            Error::Database(_) => ErrorCode::DatabaseError,
            Error::Migration(_) => ErrorCode::MigrationError,
            Error::Closed => ErrorCode::IndexClosed,
        }
    }

    // Convenience constructors

    pub fn task_not_found(index: usize) -> Self {
        Error::NotFound {
            what: "task",
            key: index.to_string(),
        }
    }

    pub fn global_task_not_found(id: i64) -> Self {
        Error::NotFound {
            what: "global task",
            key: id.to_string(),
        }
    }

    pub fn project_not_found(key: impl ToString) -> Self {
        Error::NotFound {
            what: "project",
            key: key.to_string(),
        }
    }

    pub fn note_out_of_range(index: usize, len: usize) -> Self {
        Error::OutOfRange {
            what: "note",
            index,
            len,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;
