//! # RisuSave Storage
//!
//! Durable key-value byte store for RisuSave.
//!
//! Stores are **opaque byte stores** - they do not interpret the data they
//! hold. The sync server decides what the bytes mean.
//!
//! ## Design Principles
//!
//! - Stores are simple byte maps (get, put, delete, list by prefix)
//! - No knowledge of the container format or snapshots
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral storage
//! - [`FileStore`] - One file per key inside a directory
//!
//! ## Example
//!
//! ```rust
//! use risusave_storage::{InMemoryStore, KeyValueStore, StorageKey};
//!
//! let store = InMemoryStore::new();
//! let key = StorageKey::from_hex("6869").unwrap();
//! store.put(&key, b"hello world").unwrap();
//! assert_eq!(store.get(&key).unwrap().unwrap(), b"hello world");
//! assert_eq!(key.logical_name(), "hi");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod key;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use key::StorageKey;
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
