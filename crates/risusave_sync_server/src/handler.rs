//! Request handlers for the storage and patch endpoints.

use crate::cache::SnapshotCache;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use risusave_storage::StorageKey;
use risusave_sync_protocol::{ListResponse, PatchRequest, PatchResponse, SuccessResponse};
use std::sync::Arc;
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Snapshot cache (shared across all handlers and flush tasks).
    pub cache: Arc<SnapshotCache>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, cache: Arc<SnapshotCache>) -> Self {
        Self { config, cache }
    }
}

/// Handler for storage and patch requests.
///
/// Paths arrive hex-encoded, as they do in request headers.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a read. `None` means nothing is stored at the path.
    pub async fn handle_read(&self, hex_path: &str) -> ServerResult<Option<Vec<u8>>> {
        let key = parse_key(hex_path)?;
        self.context.cache.read(&key).await
    }

    /// Handles a full write of raw container bytes.
    pub async fn handle_write(&self, hex_path: &str, data: Vec<u8>) -> ServerResult<SuccessResponse> {
        let key = parse_key(hex_path)?;
        self.context.cache.write(&key, data).await?;
        Ok(SuccessResponse::default())
    }

    /// Handles a removal.
    pub async fn handle_remove(&self, hex_path: &str) -> ServerResult<SuccessResponse> {
        let key = parse_key(hex_path)?;
        self.context.cache.remove(&key).await?;
        Ok(SuccessResponse::default())
    }

    /// Handles a listing. `prefix` is a plain logical-name prefix.
    pub async fn handle_list(&self, prefix: &str) -> ServerResult<ListResponse> {
        let keys = self.context.cache.list(prefix).await?;
        let names = keys
            .iter()
            .map(|key| key.logical_name().into_owned())
            .collect();
        Ok(ListResponse::new(names))
    }

    /// Handles a patch request.
    pub async fn handle_patch(&self, request: PatchRequest) -> ServerResult<PatchResponse> {
        if !self.context.config.patch_sync_enabled {
            return Err(ServerError::PatchSyncDisabled);
        }
        let key = parse_key(&request.path)?;
        debug!(%key, ops = request.patch.len(), "patch request");

        let applied = self
            .context
            .cache
            .apply(&key, &request.patch, request.expected_hash)
            .await?;
        Ok(PatchResponse::new(applied))
    }
}

fn parse_key(hex_path: &str) -> ServerResult<StorageKey> {
    if hex_path.is_empty() {
        return Err(ServerError::InvalidRequest("File path required".into()));
    }
    StorageKey::from_hex(hex_path)
        .map_err(|_| ServerError::InvalidRequest(format!("Invalid path: {hex_path}")))
}
