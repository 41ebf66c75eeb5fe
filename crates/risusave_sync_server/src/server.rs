//! Main sync server.

use crate::cache::{SlotState, SnapshotCache};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::persistence::Persistence;
use risusave_codec::StructuralHash;
use risusave_storage::{InMemoryStore, KeyValueStore, StorageKey};
use risusave_sync_protocol::{
    from_json, to_json, ErrorResponse, ListResponse, PatchRequest, PatchResponse, ProtocolResult,
    SuccessResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// A status code and JSON body, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTTP-style status code.
    pub status: u16,
    /// JSON body.
    pub body: Vec<u8>,
}

impl Reply {
    /// A 200 reply carrying `body`.
    pub fn ok<T: Serialize>(body: &T) -> Self {
        Self::json(200, body)
    }

    /// The reply for a failed request.
    pub fn error(err: &ServerError) -> Self {
        Self::json(err.status_code(), &ErrorResponse::new(err.client_message()))
    }

    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match to_json(body) {
            Ok(body) => Self { status, body },
            Err(e) => {
                error!(error = %e, "failed to serialize reply");
                Self {
                    status: 500,
                    body: br#"{"error":"internal error"}"#.to_vec(),
                }
            }
        }
    }

    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body.
    pub fn parse<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        from_json(&self.body)
    }
}

/// The sync server.
///
/// Keeps decoded snapshots in memory, applies hash-checked patches to them
/// and writes them back to the store after a quiet period.
///
/// # Example
///
/// ```
/// use risusave_codec::{structural_hash, Value};
/// use risusave_storage::StorageKey;
/// use risusave_sync_protocol::{PatchOperation, PatchRequest};
/// use risusave_sync_server::{ServerConfig, SyncServer};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let (server, _store) = SyncServer::in_memory(ServerConfig::default().with_patch_sync(true));
///
/// let request = PatchRequest {
///     path: StorageKey::from("database/database.bin").to_hex(),
///     patch: vec![PatchOperation::add("/name", "risu")],
///     expected_hash: structural_hash(&Value::object()),
/// };
/// let response = server.patch(request).await.unwrap();
/// assert_eq!(response.applied_operations, 1);
/// # });
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a sync server over `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let persistence = Arc::new(Persistence::new(store, config.clone()));
        let cache = Arc::new(SnapshotCache::new(persistence));
        let context = Arc::new(HandlerContext::new(config, cache));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Creates a sync server over a fresh in-memory store.
    pub fn in_memory(config: ServerConfig) -> (Self, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let server = Self::new(config, store.clone());
        (server, store)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Reads the durable bytes at a hex path.
    pub async fn read(&self, hex_path: &str) -> ServerResult<Option<Vec<u8>>> {
        self.handler.handle_read(hex_path).await
    }

    /// Writes raw container bytes to a hex path.
    pub async fn write(&self, hex_path: &str, data: Vec<u8>) -> ServerResult<SuccessResponse> {
        self.handler.handle_write(hex_path, data).await
    }

    /// Removes a hex path.
    pub async fn remove(&self, hex_path: &str) -> ServerResult<SuccessResponse> {
        self.handler.handle_remove(hex_path).await
    }

    /// Lists logical names starting with `prefix`.
    pub async fn list(&self, prefix: &str) -> ServerResult<ListResponse> {
        self.handler.handle_list(prefix).await
    }

    /// Applies a patch request.
    pub async fn patch(&self, request: PatchRequest) -> ServerResult<PatchResponse> {
        self.handler.handle_patch(request).await
    }

    /// Handles a JSON patch body and builds the reply.
    pub async fn handle_patch_body(&self, body: &[u8]) -> Reply {
        let result = match from_json::<PatchRequest>(body) {
            Ok(request) => self.patch(request).await,
            Err(e) => Err(ServerError::from(e)),
        };
        match result {
            Ok(response) => Reply::ok(&response),
            Err(e) => Reply::error(&e),
        }
    }

    /// Writes every pending snapshot now. Call before shutting down.
    pub async fn flush_all(&self) -> ServerResult<usize> {
        self.context.cache.flush_all().await
    }

    /// Hash of the cached snapshot for a logical key, if one is cached.
    pub async fn cached_hash(&self, key: &StorageKey) -> Option<StructuralHash> {
        self.context.cache.cached_hash(key).await
    }

    /// Cache state of a logical key.
    pub async fn cache_state(&self, key: &StorageKey) -> SlotState {
        self.context.cache.state(key).await
    }
}
