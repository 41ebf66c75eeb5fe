//! Durable side of the server: store access, snapshot encoding, backups.
//!
//! Store calls are blocking, so they run on tokio's blocking pool.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use parking_lot::Mutex;
use risusave_codec::{decode_container, encode_legacy, Value};
use risusave_storage::{KeyValueStore, StorageKey};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

/// Hands out backup ids derived from wall-clock time.
///
/// An id is the current time in tenths of a second. Two flushes in the
/// same tenth still get distinct, increasing ids.
#[derive(Debug, Default)]
pub struct BackupClock {
    last: Mutex<u64>,
}

impl BackupClock {
    /// Creates a clock that has issued no ids yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id for a flush happening at `now_millis`.
    pub fn next_id(&self, now_millis: u64) -> u64 {
        let mut last = self.last.lock();
        let id = (now_millis / 100).max(last.saturating_add(1));
        *last = id;
        id
    }

    /// Returns the next id for a flush happening now.
    pub fn next_id_now(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.next_id(now)
    }
}

/// Store access shared by the cache and its flush tasks.
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
    config: ServerConfig,
    clock: BackupClock,
}

impl Persistence {
    /// Wraps a store.
    pub fn new(store: Arc<dyn KeyValueStore>, config: ServerConfig) -> Self {
        Self {
            store,
            config,
            clock: BackupClock::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Reads the raw bytes stored under `key`.
    pub async fn get(&self, key: &StorageKey) -> ServerResult<Option<Vec<u8>>> {
        let store = Arc::clone(&self.store);
        let key = key.clone();
        run_blocking(move || store.get(&key)).await
    }

    /// Writes raw bytes under `key`.
    pub async fn put(&self, key: &StorageKey, data: Vec<u8>) -> ServerResult<()> {
        let store = Arc::clone(&self.store);
        let key = key.clone();
        run_blocking(move || store.put(&key, &data)).await
    }

    /// Deletes `key`.
    pub async fn delete(&self, key: &StorageKey) -> ServerResult<()> {
        let store = Arc::clone(&self.store);
        let key = key.clone();
        run_blocking(move || store.delete(&key)).await
    }

    /// Lists keys starting with `prefix`.
    pub async fn list(&self, prefix: &[u8]) -> ServerResult<Vec<StorageKey>> {
        let store = Arc::clone(&self.store);
        let prefix = prefix.to_vec();
        run_blocking(move || store.list_prefix(&prefix)).await
    }

    /// Loads and decodes the snapshot at `key`.
    ///
    /// A missing key loads as an empty object.
    pub async fn load_snapshot(&self, key: &StorageKey) -> ServerResult<Value> {
        match self.get(key).await? {
            Some(bytes) => {
                let value = decode_container(&bytes)?;
                debug!(%key, bytes = bytes.len(), "loaded snapshot");
                Ok(value)
            }
            None => {
                debug!(%key, "no stored snapshot, starting empty");
                Ok(Value::object())
            }
        }
    }

    /// Encodes `snapshot` and writes it to `key`.
    ///
    /// With `backup` set and `key` naming the primary database, a copy is
    /// also written under a fresh backup key. A failed backup is logged
    /// and does not fail the flush.
    pub async fn save_snapshot(
        &self,
        key: &StorageKey,
        snapshot: &Value,
        backup: bool,
    ) -> ServerResult<()> {
        let bytes = encode_legacy(snapshot)?;
        let len = bytes.len();
        let backup_bytes = (backup && key.contains(&self.config.primary_marker)).then(|| bytes.clone());

        self.put(key, bytes).await?;
        info!(%key, bytes = len, "snapshot saved");

        if let Some(backup_bytes) = backup_bytes {
            let backup_key = StorageKey::from(self.config.backup_name(self.clock.next_id_now()));
            match self.put(&backup_key, backup_bytes).await {
                Ok(()) => debug!(key = %backup_key, "backup written"),
                Err(e) => error!(key = %backup_key, error = %e, "backup write failed"),
            }
        }
        Ok(())
    }
}

async fn run_blocking<T, F>(f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> risusave_storage::StorageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("storage task failed: {e}")))?
        .map_err(ServerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use risusave_codec::{encode_modern, ContainerFormat};
    use risusave_storage::InMemoryStore;

    fn persistence() -> (Persistence, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let persistence = Persistence::new(store.clone(), ServerConfig::default());
        (persistence, store)
    }

    #[test]
    fn backup_ids_are_strictly_increasing() {
        let clock = BackupClock::new();
        assert_eq!(clock.next_id(1_000), 10);
        assert_eq!(clock.next_id(1_050), 11);
        assert_eq!(clock.next_id(1_060), 12);
        assert_eq!(clock.next_id(5_000), 50);
        assert_eq!(clock.next_id(100), 51);
    }

    #[tokio::test]
    async fn missing_key_loads_empty_object() {
        let (persistence, _) = persistence();
        let value = persistence
            .load_snapshot(&StorageKey::from("database/database.bin"))
            .await
            .unwrap();
        assert_eq!(value, Value::object());
    }

    #[tokio::test]
    async fn load_accepts_any_format() {
        let (persistence, store) = persistence();
        let key = StorageKey::from("a.bin");
        let mut value = Value::object();
        value.insert("x", Value::from(1));
        store.put(&key, &encode_modern(&value).unwrap()).unwrap();
        assert_eq!(persistence.load_snapshot(&key).await.unwrap(), value);
    }

    #[tokio::test]
    async fn load_garbage_is_decode_error() {
        let (persistence, store) = persistence();
        let key = StorageKey::from("a.bin");
        store.put(&key, b"\xc1garbage").unwrap();
        assert!(matches!(
            persistence.load_snapshot(&key).await,
            Err(ServerError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn save_writes_raw_container() {
        let (persistence, store) = persistence();
        let key = StorageKey::from("other.bin");
        persistence
            .save_snapshot(&key, &Value::object(), true)
            .await
            .unwrap();
        let bytes = store.get(&key).unwrap().unwrap();
        assert_eq!(ContainerFormat::detect(&bytes), Some(ContainerFormat::Raw));
        // Only the primary database gets backups.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_primary_writes_backup() {
        let (persistence, store) = persistence();
        let key = StorageKey::from("database/database.bin");
        persistence
            .save_snapshot(&key, &Value::object(), true)
            .await
            .unwrap();
        persistence
            .save_snapshot(&key, &Value::object(), true)
            .await
            .unwrap();

        let backups = store.list_prefix(b"database/dbbackup-").unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(
            store.get(&backups[0]).unwrap(),
            store.get(&key).unwrap()
        );
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(risusave_storage::FileStore::open(dir.path()).unwrap());
        let persistence = Persistence::new(store, ServerConfig::default());
        let key = StorageKey::from("database/database.bin");
        let value = Value::map([("formatversion", Value::from(3))]);

        persistence.save_snapshot(&key, &value, true).await.unwrap();
        assert_eq!(persistence.load_snapshot(&key).await.unwrap(), value);
        assert_eq!(persistence.list(b"database/").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn save_without_backup_flag() {
        let (persistence, store) = persistence();
        let key = StorageKey::from("database/database.bin");
        persistence
            .save_snapshot(&key, &Value::object(), false)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_failure_is_reported() {
        let (persistence, store) = persistence();
        store.set_fail_writes(true);
        let result = persistence
            .save_snapshot(&StorageKey::from("a.bin"), &Value::object(), true)
            .await;
        assert!(matches!(result, Err(ServerError::Storage(_))));
    }
}
