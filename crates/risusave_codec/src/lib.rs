//! # RisuSave Codec
//!
//! Save-file encoding and structural hashing for RisuSave.
//!
//! This crate provides:
//! - [`Value`], the JSON-like snapshot type
//! - the packed (MessagePack) encoding of a snapshot
//! - the versioned container (`"\0RISUSAVE"` header, optional gzip) and the
//!   decode ladder that still reads every historical save format
//! - [`structural_hash`], the 32-bit fingerprint used for optimistic
//!   concurrency between client and server
//!
//! ## Container formats
//!
//! | marker  | format            | payload              |
//! |---------|-------------------|----------------------|
//! | `00 07` | raw               | packed               |
//! | `00 08` | block-compressed  | gzip(packed)         |
//! | `00 09` | stream-compressed | gzip(packed)         |
//!
//! Header-less saves (bare packed, legacy marker, compressed JSON) are read
//! through the fallback stages of [`decode_container`].
//!
//! ## Usage
//!
//! ```
//! use risusave_codec::{decode_container, encode_modern, structural_hash, Value};
//!
//! let db = Value::map([("a", Value::Integer(1))]);
//! let bytes = encode_modern(&db).unwrap();
//! let decoded = decode_container(&bytes).unwrap();
//! assert_eq!(decoded, db);
//! assert_eq!(structural_hash(&decoded).to_string(), "9d79563e");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod container;
mod decoder;
mod encoder;
mod error;
mod hash;
mod number;
mod value;

pub use container::{
    decode_container, decode_container_detailed, decompress_auto, encode_container,
    encode_legacy, encode_modern, ContainerFormat, DecodeStage, Decoded, HEADER_LEN,
    LEGACY_MARKER, MAGIC_TAG,
};
pub use decoder::{from_packed, PackedDecoder};
pub use encoder::{to_packed, PackedEncoder};
pub use error::{CodecError, CodecResult, DecodeAttempt, DecodeError};
pub use hash::{structural_hash, StructuralHash};
pub use number::format_js_number;
pub use value::Value;
