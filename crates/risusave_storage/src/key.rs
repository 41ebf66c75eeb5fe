//! Storage keys.

use crate::error::{StorageError, StorageResult};
use std::borrow::Cow;
use std::fmt;

/// An opaque key into a [`KeyValueStore`](crate::KeyValueStore).
///
/// The key holds the logical name as raw bytes, for example
/// `database/database.bin`. Requests carry it hex-encoded.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(Vec<u8>);

impl StorageKey {
    /// Creates a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parses a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if `hex` is empty or not valid hex.
    pub fn from_hex(hex: &str) -> StorageResult<Self> {
        if hex.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        hex::decode(hex)
            .map(Self)
            .map_err(|e| StorageError::InvalidKey(format!("{hex:?}: {e}")))
    }

    /// Returns the hex encoding of this key.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the logical name, replacing invalid UTF-8.
    pub fn logical_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Returns true if the logical name contains `marker`.
    pub fn contains(&self, marker: &str) -> bool {
        !marker.is_empty()
            && self
                .0
                .windows(marker.len())
                .any(|window| window == marker.as_bytes())
    }

    /// Returns true if the key starts with `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({:?})", self.logical_name())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.logical_name())
    }
}

impl From<&str> for StorageKey {
    fn from(name: &str) -> Self {
        Self(name.as_bytes().to_vec())
    }
}

impl From<String> for StorageKey {
    fn from(name: String) -> Self {
        Self(name.into_bytes())
    }
}
