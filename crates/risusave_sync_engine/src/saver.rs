//! Client save flow: patch when possible, full save otherwise.

use crate::config::{SaveConfig, SaveFormat};
use crate::coordinator::SaveCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::transport::SaveTransport;
use risusave_codec::Value;
use tracing::{debug, info, warn};

/// What a save ended up sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The whole snapshot was written.
    Full {
        /// Container size in bytes.
        bytes: usize,
    },
    /// A patch was accepted.
    Patched {
        /// Operations the server applied.
        applied: usize,
    },
    /// The server refused the patch and the whole snapshot was written
    /// instead.
    FullAfterRejection {
        /// Container size in bytes.
        bytes: usize,
    },
    /// Nothing changed since the last save; nothing was sent.
    Unchanged,
}

/// Saves a database through a [`SaveTransport`], sending JSON patches
/// against the last synced snapshot when patch sync is on.
pub struct DatabaseSaver<T: SaveTransport> {
    config: SaveConfig,
    coordinator: SaveCoordinator,
    transport: T,
}

impl<T: SaveTransport> DatabaseSaver<T> {
    /// Creates a saver and starts its worker. Must be called inside a
    /// tokio runtime.
    pub fn new(config: SaveConfig, transport: T) -> SyncResult<Self> {
        let coordinator = SaveCoordinator::spawn(&config.worker_name)?;
        Ok(Self {
            config,
            coordinator,
            transport,
        })
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    /// Records `db` as what the server already holds, typically right after
    /// loading it.
    pub async fn initialize(&self, db: &Value) -> SyncResult<()> {
        self.coordinator.initialize(Some(db.clone())).await
    }

    /// Saves `db`.
    pub async fn save(&self, db: &Value) -> SyncResult<SaveOutcome> {
        let json = serde_json::to_string(db).map_err(|e| SyncError::Protocol(e.to_string()))?;
        self.save_json(&json).await
    }

    /// Saves a database given as JSON text.
    ///
    /// The text is staged into the worker in chunks, so the caller never
    /// parses or encodes it itself.
    pub async fn save_json(&self, json: &str) -> SyncResult<SaveOutcome> {
        self.coordinator
            .stage_json(json, self.config.chunk_size)
            .await?;

        if !self.config.patch_sync {
            let bytes = self.full_save().await?;
            return Ok(SaveOutcome::Full { bytes });
        }

        let plan = self.coordinator.compute_patch(None).await?;
        if plan.is_noop() {
            debug!("no changes since last save");
            return Ok(SaveOutcome::Unchanged);
        }

        let Some(request) = plan.into_request(self.config.hex_path()) else {
            let bytes = self.full_save().await?;
            return Ok(SaveOutcome::Full { bytes });
        };

        let operations = request.patch.len();
        match self.transport.send_patch(request).await {
            Ok(response) => {
                debug!(operations, applied = response.applied_operations, "patch saved");
                Ok(SaveOutcome::Patched {
                    applied: response.applied_operations,
                })
            }
            Err(e) if e.needs_full_save() => {
                warn!(error = %e, "patch rejected, falling back to full save");
                let bytes = self.full_save().await?;
                Ok(SaveOutcome::FullAfterRejection { bytes })
            }
            Err(e) => Err(e),
        }
    }

    async fn full_save(&self) -> SyncResult<usize> {
        let bytes = match self.config.full_save_format {
            SaveFormat::Legacy => self.coordinator.encode_legacy(None).await?,
            SaveFormat::Modern => self.coordinator.encode(None).await?,
        };
        let len = bytes.len();
        self.transport
            .save_full(&self.config.hex_path(), bytes)
            .await?;
        info!(bytes = len, path = %self.config.database_path, "full save written");
        Ok(len)
    }

    /// Stops the worker. Later saves fail with [`SyncError::Terminated`].
    pub fn terminate(&self) {
        self.coordinator.terminate();
    }
}
