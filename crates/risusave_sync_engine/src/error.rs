//! Error types for the sync engine.

use risusave_codec::CodecError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during save and sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// Protocol error (invalid message format).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server's copy no longer matches the client's baseline.
    #[error("hash mismatch: server data is out of sync")]
    Conflict,

    /// The server refused a patch request.
    #[error("server rejected patch ({status}): {message}")]
    Rejected {
        /// Status code of the reply.
        status: u16,
        /// Error text from the reply.
        message: String,
    },

    /// An operation needed a snapshot and none was given or committed.
    #[error("database not provided")]
    DatabaseNotProvided,

    /// Staged upload misuse or unparsable staged JSON.
    #[error("staged upload error: {0}")]
    Staging(String),

    /// Encoding failed on the worker.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The worker thread died while requests were pending.
    #[error("save worker failed")]
    WorkerFault,

    /// The worker was terminated.
    #[error("save worker terminated")]
    Terminated,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Maps a failed patch reply to an error.
    pub fn from_reply(status: u16, message: impl Into<String>) -> Self {
        match status {
            409 => Self::Conflict,
            _ => Self::Rejected {
                status,
                message: message.into(),
            },
        }
    }

    /// Returns true if the caller should fall back to writing the whole
    /// snapshot.
    pub fn needs_full_save(&self) -> bool {
        matches!(self, SyncError::Conflict | SyncError::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_mapping() {
        assert!(matches!(SyncError::from_reply(409, "x"), SyncError::Conflict));
        assert!(SyncError::from_reply(409, "x").needs_full_save());
        assert!(SyncError::from_reply(404, "off").needs_full_save());
        assert!(!SyncError::NotConnected.needs_full_save());
        assert!(!SyncError::WorkerFault.needs_full_save());
        let transport = SyncError::Transport {
            message: "connection reset".into(),
        };
        assert!(!transport.needs_full_save());
        assert_eq!(transport.to_string(), "transport error: connection reset");
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to server");

        let err = SyncError::Rejected {
            status: 500,
            message: "Patch application failed".into(),
        };
        assert!(err.to_string().contains("500"));
        assert_eq!(SyncError::DatabaseNotProvided.to_string(), "database not provided");
    }
}
