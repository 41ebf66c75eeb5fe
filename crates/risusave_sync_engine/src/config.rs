//! Configuration for the save flow.

/// Default logical path of the primary database.
pub const DEFAULT_DATABASE_PATH: &str = "database/database.bin";

/// Container used for full saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveFormat {
    /// Uncompressed container, the same format the server writes.
    #[default]
    Legacy,
    /// Stream-compressed container.
    Modern,
}

/// Configuration for a [`DatabaseSaver`](crate::DatabaseSaver).
#[derive(Debug, Clone)]
pub struct SaveConfig {
    /// Send patches instead of full snapshots when possible.
    pub patch_sync: bool,
    /// Logical path of the database on the server.
    pub database_path: String,
    /// Container written by full saves.
    pub full_save_format: SaveFormat,
    /// Size in bytes of each chunk of JSON text staged into the worker.
    pub chunk_size: usize,
    /// Name of the worker thread.
    pub worker_name: String,
}

impl SaveConfig {
    /// Creates a configuration with defaults (patch sync enabled).
    pub fn new() -> Self {
        Self {
            patch_sync: true,
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            full_save_format: SaveFormat::Legacy,
            chunk_size: 1 << 20,
            worker_name: "risusave-save-worker".to_string(),
        }
    }

    /// Enables or disables patch sync.
    pub fn with_patch_sync(mut self, enabled: bool) -> Self {
        self.patch_sync = enabled;
        self
    }

    /// Sets the database path.
    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Sets the full save format.
    pub fn with_full_save_format(mut self, format: SaveFormat) -> Self {
        self.full_save_format = format;
        self
    }

    /// Sets the staging chunk size. Zero is treated as one byte.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Hex form of the database path, as sent on the wire.
    pub fn hex_path(&self) -> String {
        hex::encode(self.database_path.as_bytes())
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self::new()
    }
}
