//! Error types for the sync protocol.

use thiserror::Error;

/// Result type for envelope parsing.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A patch operation could not be applied.
///
/// Every variant carries the zero-based index of the failing operation. A
/// failed patch leaves the target document unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A path or `from` field is not a valid JSON Pointer.
    #[error("operation {index}: malformed operation: {reason}")]
    Malformed {
        /// Failing operation index.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The operation does not fit the document: a missing path, a bad array
    /// index, a failed `test` or a `move` into its own child.
    #[error("operation {index}: {reason} at {path:?}")]
    Rejected {
        /// Failing operation index.
        index: usize,
        /// Path the operation failed at.
        path: String,
        /// Why the document rejected it.
        reason: String,
    },
}

impl PatchError {
    /// Returns the index of the operation that failed.
    pub fn op_index(&self) -> usize {
        match self {
            PatchError::Malformed { index, .. } | PatchError::Rejected { index, .. } => *index,
        }
    }
}

/// Errors that can occur while reading or writing protocol envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The envelope is not valid JSON or does not have the expected shape.
    #[error("malformed envelope: {message}")]
    Malformed {
        /// Parser message.
        message: String,
    },

    /// The envelope could not be serialized.
    #[error("failed to serialize envelope: {message}")]
    Serialize {
        /// Serializer message.
        message: String,
    },
}

impl ProtocolError {
    /// Create a malformed envelope error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
