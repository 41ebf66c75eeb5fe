//! Error types for the sync server.

use risusave_codec::{CodecError, DecodeError, StructuralHash};
use risusave_storage::StorageError;
use risusave_sync_protocol::{PatchError, ProtocolError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format or path.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Patch requests are switched off.
    #[error("patch sync is not enabled")]
    PatchSyncDisabled,

    /// The client's view of the snapshot is stale.
    #[error("hash mismatch: expected {expected}, server has {actual}")]
    HashMismatch {
        /// Hash the client sent.
        expected: StructuralHash,
        /// Hash of the cached snapshot.
        actual: StructuralHash,
    },

    /// A patch operation could not be applied.
    #[error("patch application failed: {0}")]
    Patch(#[from] PatchError),

    /// Stored bytes could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A snapshot could not be encoded.
    #[error("encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// Durable storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// HTTP-style status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::Storage(e) if e.is_client_error() => 400,
            ServerError::PatchSyncDisabled => 404,
            ServerError::HashMismatch { .. } => 409,
            ServerError::Patch(_)
            | ServerError::Decode(_)
            | ServerError::Codec(_)
            | ServerError::Storage(_)
            | ServerError::Internal(_) => 500,
        }
    }

    /// The message sent back in the `error` field of a reply.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::InvalidRequest(message) => message.clone(),
            ServerError::PatchSyncDisabled => "Patch sync is not enabled".to_string(),
            ServerError::HashMismatch { .. } => "Hash mismatch - data out of sync".to_string(),
            ServerError::Patch(e) => format!("Patch application failed: {e}"),
            other => other.to_string(),
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Malformed { message } => ServerError::InvalidRequest(message),
            ProtocolError::Serialize { message } => ServerError::Internal(message),
        }
    }
}
