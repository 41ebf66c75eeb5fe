//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key could not be parsed or mapped to storage.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The store contents are corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Returns true if the caller supplied a bad key.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StorageError::InvalidKey(_))
    }
}
