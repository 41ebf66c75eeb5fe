//! # RisuSave Sync Engine
//!
//! Client side of RisuSave patch sync.
//!
//! This crate provides:
//! - A save worker thread that owns the sync baseline
//! - An async coordinator correlating worker requests and results by id
//! - A transport abstraction for full saves and patch requests
//! - [`DatabaseSaver`], the save flow with full-save fallback
//!
//! ## Architecture
//!
//! Hashing, diffing and encoding a large database is slow, so none of it
//! runs on the caller's task. The caller stages the database as JSON text
//! into the worker; the worker diffs it against the last synced snapshot,
//! returns `{patch, expectedHash, needsFullSave}` and makes it the new
//! baseline.
//!
//! ## Key Invariants
//!
//! - Only the worker thread reads or writes the baseline
//! - Requests are processed in the order they were sent
//! - A dead worker fails every pending request; nothing is retried
//! - The first save after start is always a full save

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod saver;
mod session;
mod transport;
mod worker;

pub use config::{SaveConfig, SaveFormat, DEFAULT_DATABASE_PATH};
pub use coordinator::SaveCoordinator;
pub use error::{SyncError, SyncResult};
pub use saver::{DatabaseSaver, SaveOutcome};
pub use session::SyncSession;
pub use transport::{MockPatchReply, MockTransport, SaveTransport};
