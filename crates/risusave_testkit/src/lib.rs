//! # RisuSave Testkit
//!
//! Test utilities for RisuSave.
//!
//! This crate provides:
//! - Sample databases and builders for every historical save layout
//! - Property-based test generators using proptest
//! - Structural hash vectors shared with other client implementations
//!
//! ## Usage
//!
//! ```rust
//! use risusave_testkit::prelude::*;
//! use risusave_codec::decode_container;
//!
//! let db = sample_database();
//! let bytes = legacy_bytes(&db, LegacyLayout::LegacyMarker).unwrap();
//! assert_eq!(decode_container(&bytes).unwrap(), db);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
