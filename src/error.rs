//! Error types for StrataKV
//!
//! Provides a unified error type for all operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for StrataKV operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt table metadata in {}: {reason}", path.display())]
    CorruptMetadata { path: PathBuf, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // Lookup Outcomes (only surfaced by typed accessors)
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Key was deleted")]
    KeyTombstoned,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for StrataError {
    fn from(e: bincode::Error) -> Self {
        StrataError::Encoding(e.to_string())
    }
}

impl StrataError {
    /// Build a `map_err` adapter that attaches `path` to an I/O error.
    pub(crate) fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> StrataError + '_ {
        move |source| StrataError::FileIo {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> StrataError {
        StrataError::CorruptMetadata {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
