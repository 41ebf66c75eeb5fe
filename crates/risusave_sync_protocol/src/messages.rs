//! Request and response envelopes exchanged between client and server.
//!
//! All envelopes are JSON with camelCase field names.

use crate::error::{ProtocolError, ProtocolResult};
use crate::operation::PatchOperation;
use risusave_codec::StructuralHash;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Parses an envelope from JSON bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the bytes are not valid JSON or
/// do not match the envelope shape.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::malformed(e.to_string()))
}

/// Serializes an envelope to JSON bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if serialization fails.
pub fn to_json<T: Serialize>(envelope: &T) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(|e| ProtocolError::Serialize {
        message: e.to_string(),
    })
}

/// A patch request: apply `patch` to the snapshot stored at `path`, provided
/// the server's copy still hashes to `expected_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    /// Hex-encoded storage key.
    pub path: String,
    /// Operations to apply, in order.
    pub patch: Vec<PatchOperation>,
    /// Hash of the snapshot the patch was computed against.
    pub expected_hash: StructuralHash,
}

/// Successful patch application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResponse {
    /// Always `true`.
    pub success: bool,
    /// Number of operations applied.
    pub applied_operations: usize,
}

impl PatchResponse {
    /// Creates a success response.
    pub fn new(applied_operations: usize) -> Self {
        Self {
            success: true,
            applied_operations,
        }
    }
}

/// Error reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error.
    pub error: String,
}

impl ErrorResponse {
    /// Creates an error response.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Plain success reply for writes and removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

impl Default for SuccessResponse {
    fn default() -> Self {
        Self { success: true }
    }
}

/// Reply listing keys under a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Always `true`.
    pub success: bool,
    /// Logical key names.
    pub content: Vec<String>,
}

impl ListResponse {
    /// Creates a list response.
    pub fn new(content: Vec<String>) -> Self {
        Self {
            success: true,
            content,
        }
    }
}

/// What a client should send for its next save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPlan {
    /// Operations since the last synced snapshot. Empty when a full save is
    /// needed.
    pub patch: Vec<PatchOperation>,
    /// Hash of the last synced snapshot, if there is one.
    pub expected_hash: Option<StructuralHash>,
    /// True when there is no baseline yet and the full snapshot must be
    /// written.
    pub needs_full_save: bool,
}

impl PatchPlan {
    /// A plan asking for a full save.
    pub fn full_save() -> Self {
        Self {
            patch: Vec::new(),
            expected_hash: None,
            needs_full_save: true,
        }
    }

    /// Returns true if there is nothing to send.
    pub fn is_noop(&self) -> bool {
        !self.needs_full_save && self.patch.is_empty()
    }

    /// Builds the request for `path`, or `None` when a full save is needed.
    pub fn into_request(self, path: impl Into<String>) -> Option<PatchRequest> {
        match (self.needs_full_save, self.expected_hash) {
            (false, Some(expected_hash)) => Some(PatchRequest {
                path: path.into(),
                patch: self.patch,
                expected_hash,
            }),
            _ => None,
        }
    }
}
