//! Error types for ArborFS.

use thiserror::Error;

/// Result type alias using FsError.
pub type Result<T> = std::result::Result<T, FsError>;

/// Errors that can occur in ArborFS operations.
///
/// The core has no transient-failure sources, so nothing here is ever
/// retried internally; every variant is reported to the immediate caller.
#[derive(Debug, Error)]
pub enum FsError {
    // Path resolution / namespace errors
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    // Snapshot persistence errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot corrupted: {0}")]
    SnapshotCorrupted(String),
}

impl FsError {
    /// Returns true for errors produced by namespace operations, as opposed
    /// to snapshot persistence failures.
    pub fn is_namespace_error(&self) -> bool {
        !matches!(self, FsError::Io(_) | FsError::SnapshotCorrupted(_))
    }
}
