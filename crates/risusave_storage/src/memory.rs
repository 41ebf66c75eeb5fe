//! In-memory store for testing.

use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;
use crate::store::KeyValueStore;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory key-value store.
///
/// This store keeps all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral servers that don't need persistence
///
/// It counts successful writes per key so tests can assert how many times
/// a key was persisted, and can be told to fail writes.
///
/// # Example
///
/// ```rust
/// use risusave_storage::{InMemoryStore, KeyValueStore, StorageKey};
///
/// let store = InMemoryStore::new();
/// let key = StorageKey::from("database/database.bin");
/// store.put(&key, b"data").unwrap();
/// assert_eq!(store.get(&key).unwrap().as_deref(), Some(&b"data"[..]));
/// assert_eq!(store.put_count(&key), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<StorageKey, Vec<u8>>>,
    puts: RwLock<HashMap<StorageKey, usize>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing entries.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (StorageKey, Vec<u8>)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Number of successful `put` calls for `key`.
    #[must_use]
    pub fn put_count(&self, key: &StorageKey) -> usize {
        self.puts.read().get(key).copied().unwrap_or(0)
    }

    /// Number of successful `put` calls across all keys.
    #[must_use]
    pub fn total_puts(&self) -> usize {
        self.puts.read().values().sum()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Makes every subsequent `put` fail with an I/O error until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &StorageKey, data: &[u8]) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "write failure injected",
            )));
        }
        self.entries.write().insert(key.clone(), data.to_vec());
        *self.puts.write().entry(key.clone()).or_insert(0) += 1;
        Ok(())
    }

    fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn list_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<StorageKey>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
