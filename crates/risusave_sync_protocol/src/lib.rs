//! # RisuSave Sync Protocol
//!
//! Diff/patch primitives and wire envelopes for RisuSave patch sync.
//!
//! This crate provides:
//! - [`PatchOperation`], RFC 6902 operations over snapshot values
//! - [`diff`] to compute a patch between two snapshots
//! - [`apply_patch`] / [`apply_patch_cloned`] to apply one
//! - JSON envelopes for patch requests and replies
//!
//! Diffing and applying are done by the `json-patch` crate; this crate
//! converts snapshots to and from `serde_json` values around it.
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod convert;
mod diff;
mod error;
mod messages;
mod operation;
mod patch;

pub use diff::diff;
pub use error::{PatchError, ProtocolError, ProtocolResult};
pub use messages::{
    from_json, to_json, ErrorResponse, ListResponse, PatchPlan, PatchRequest, PatchResponse,
    SuccessResponse,
};
pub use operation::PatchOperation;
pub use patch::{apply_patch, apply_patch_cloned};
