//! Error types for manga-dl
//!
//! One variant per failure class the orchestration core can observe:
//! - Queue bookkeeping errors returned synchronously (`DuplicateTask`, `NotFound`)
//! - Collaborator failures captured on tasks (`SourceUnavailable`, `FetchFailed`,
//!   `PersistenceFailed`)
//! - Abort reasons (`Cancelled`, `Timeout`)
//! - Ambient errors (configuration, I/O, serialization, shutdown)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for manga-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manga-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The chapter is already queued or downloading
    #[error("chapter {chapter_id} is already queued or downloading")]
    DuplicateTask {
        /// The chapter that was enqueued twice
        chapter_id: String,
    },

    /// No task, item or notification matches the given identifier
    #[error("not found: {0}")]
    NotFound(String),

    /// The content source reported itself unavailable, or an item lookup failed
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Page or chapter-list retrieval failed
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// Writing page bytes or persisting tracking data failed
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// The task was aborted by an explicit cancellation
    #[error("cancelled")]
    Cancelled,

    /// A per-page deadline was exceeded
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_downloads")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Machine-readable error classification stored on task records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::DuplicateTask`]
    DuplicateTask,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::SourceUnavailable`]
    SourceUnavailable,
    /// See [`Error::FetchFailed`]
    FetchFailed,
    /// See [`Error::PersistenceFailed`]
    PersistenceFailed,
    /// See [`Error::Cancelled`]
    Cancelled,
    /// See [`Error::Timeout`]
    Timeout,
    /// Configuration, serialization, shutdown and uncategorized errors
    Other,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DuplicateTask { .. } => ErrorKind::DuplicateTask,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            Error::FetchFailed(_) => ErrorKind::FetchFailed,
            // Disk writes surface as io errors from tokio::fs
            Error::PersistenceFailed(_) | Error::Io(_) => ErrorKind::PersistenceFailed,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Config { .. }
            | Error::Serialization(_)
            | Error::ShuttingDown
            | Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Returns true if this error is an explicit cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
