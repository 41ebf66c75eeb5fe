//! Transport layer abstraction for saves.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use risusave_sync_protocol::{PatchRequest, PatchResponse};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// A save transport carries saves to the server.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process loopback, mock for testing).
pub trait SaveTransport: Send + Sync {
    /// Writes a whole container to a hex path.
    fn save_full(&self, hex_path: &str, bytes: Vec<u8>)
        -> impl Future<Output = SyncResult<()>> + Send;

    /// Sends a patch request.
    ///
    /// A non-success reply maps to [`SyncError::from_reply`].
    fn send_patch(
        &self,
        request: PatchRequest,
    ) -> impl Future<Output = SyncResult<PatchResponse>> + Send;
}

/// What a [`MockTransport`] answers to patch requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MockPatchReply {
    /// Accept every patch.
    #[default]
    Accept,
    /// Reject every patch with this status and message.
    Reject {
        /// Status code.
        status: u16,
        /// Error text.
        message: String,
    },
    /// Fail every patch before it reaches the server.
    Unreachable {
        /// Error text.
        message: String,
    },
}

/// A mock transport for testing.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    patch_reply: Mutex<MockPatchReply>,
    full_saves: Mutex<Vec<(String, Vec<u8>)>>,
    patches: Mutex<Vec<PatchRequest>>,
}

impl MockTransport {
    /// Creates a new connected mock transport that accepts patches.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            patch_reply: Mutex::new(MockPatchReply::Accept),
            full_saves: Mutex::new(Vec::new()),
            patches: Mutex::new(Vec::new()),
        }
    }

    /// Sets the reply to patch requests.
    pub fn set_patch_reply(&self, reply: MockPatchReply) {
        *self.patch_reply.lock() = reply;
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Full saves received so far.
    pub fn full_saves(&self) -> Vec<(String, Vec<u8>)> {
        self.full_saves.lock().clone()
    }

    /// Patch requests received so far.
    pub fn patches(&self) -> Vec<PatchRequest> {
        self.patches.lock().clone()
    }

    fn check_connected(&self) -> SyncResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveTransport for MockTransport {
    async fn save_full(&self, hex_path: &str, bytes: Vec<u8>) -> SyncResult<()> {
        self.check_connected()?;
        self.full_saves.lock().push((hex_path.to_string(), bytes));
        Ok(())
    }

    async fn send_patch(&self, request: PatchRequest) -> SyncResult<PatchResponse> {
        self.check_connected()?;
        let applied = request.patch.len();
        self.patches.lock().push(request);
        let reply = self.patch_reply.lock().clone();
        match reply {
            MockPatchReply::Accept => Ok(PatchResponse::new(applied)),
            MockPatchReply::Reject { status, message } => Err(SyncError::from_reply(status, message)),
            MockPatchReply::Unreachable { message } => Err(SyncError::Transport { message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use risusave_codec::StructuralHash;

    fn request() -> PatchRequest {
        PatchRequest {
            path: "00".into(),
            patch: vec![],
            expected_hash: StructuralHash(0x11),
        }
    }

    #[tokio::test]
    async fn mock_transport_records_calls() {
        let transport = MockTransport::new();
        transport.save_full("00", vec![1, 2]).await.unwrap();
        let response = transport.send_patch(request()).await.unwrap();
        assert!(response.success);

        assert_eq!(transport.full_saves(), vec![("00".to_string(), vec![1, 2])]);
        assert_eq!(transport.patches().len(), 1);
    }

    #[tokio::test]
    async fn mock_transport_not_connected_error() {
        let transport = MockTransport::new();
        transport.set_connected(false);

        let result = transport.save_full("00", vec![]).await;
        assert!(matches!(result, Err(SyncError::NotConnected)));
        assert!(transport.full_saves().is_empty());
    }

    #[tokio::test]
    async fn mock_transport_rejects() {
        let transport = MockTransport::new();
        transport.set_patch_reply(MockPatchReply::Reject {
            status: 409,
            message: "Hash mismatch - data out of sync".into(),
        });
        let result = transport.send_patch(request()).await;
        assert!(matches!(result, Err(SyncError::Conflict)));
    }
}
