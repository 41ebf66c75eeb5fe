//! # RisuSave Sync Server
//!
//! Server side of RisuSave patch sync.
//!
//! This crate provides:
//! - Plain read, write, remove and list over a [`KeyValueStore`](risusave_storage::KeyValueStore)
//! - Hash-checked JSON Patch application against cached snapshots
//! - Debounced persistence with timestamped backups of the primary database
//!
//! # Architecture
//!
//! Decoded snapshots live in a per-key cache. A patch is accepted only when
//! the client's expected hash equals the hash of the cached snapshot; the
//! patched snapshot is written back once no patch has arrived for the
//! configured save interval. A plain read or write of the same key flushes
//! or discards the cached copy first, so direct file access always sees
//! current bytes.
//!
//! # Status codes
//!
//! | Outcome                 | Status |
//! |-------------------------|--------|
//! | Patch applied           | 200    |
//! | Malformed request       | 400    |
//! | Patch sync disabled     | 404    |
//! | Hash mismatch           | 409    |
//! | Patch or storage error  | 500    |

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod cache;
mod config;
mod error;
mod handler;
mod persistence;
mod server;

pub use cache::{SlotState, SnapshotCache};
pub use config::{ServerConfig, DEFAULT_SAVE_INTERVAL, PATCH_SYNC_ENV, SAVE_INTERVAL_ENV};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use persistence::{BackupClock, Persistence};
pub use server::{Reply, SyncServer};
