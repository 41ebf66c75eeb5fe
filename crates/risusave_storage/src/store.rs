//! Key-value store trait definition.

use crate::error::StorageResult;
use crate::key::StorageKey;

/// A durable key-value byte store.
///
/// Stores are **opaque byte stores**. They do not understand the container
/// format or snapshots; the sync server owns all interpretation.
///
/// # Invariants
///
/// - `get` returns exactly the bytes of the last successful `put`
/// - `put` replaces the whole value atomically
/// - `delete` of a missing key succeeds
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads the value stored under `key`.
    ///
    /// Returns `None` if the key has never been written or was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn get(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `data` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn put(&self, key: &StorageKey, data: &[u8]) -> StorageResult<()>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn delete(&self, key: &StorageKey) -> StorageResult<()>;

    /// Lists all keys starting with `prefix`, in ascending byte order.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn list_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<StorageKey>>;

    /// Returns true if `key` holds a value.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn contains(&self, key: &StorageKey) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
