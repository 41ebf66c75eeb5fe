//! Sample databases and save-file builders.
//!
//! Current clients only write versioned containers, but the decode ladder
//! must keep reading every layout that ever shipped. The builders here
//! produce those layouts from a [`Value`].

use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use risusave_codec::{
    encode_container, to_packed, CodecError, CodecResult, ContainerFormat, DecodeStage, Value,
    LEGACY_MARKER,
};
use std::io::{self, Write};

/// Compression wrapper used by header-less compressed saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    /// gzip (RFC 1952).
    Gzip,
    /// zlib (RFC 1950).
    Zlib,
    /// Raw deflate (RFC 1951).
    Deflate,
}

impl Wrapper {
    /// All wrappers.
    pub const ALL: [Wrapper; 3] = [Wrapper::Gzip, Wrapper::Zlib, Wrapper::Deflate];

    /// Compresses `data` with this wrapper.
    pub fn compress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Wrapper::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Wrapper::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Wrapper::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }
}

/// A save layout, current or historical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyLayout {
    /// A versioned container.
    Container(ContainerFormat),
    /// Packed bytes with no header.
    BarePacked,
    /// `"\0\0RISU"` followed by packed bytes.
    LegacyMarker,
    /// Compressed JSON text.
    CompressedJson(Wrapper),
    /// Compressed packed bytes with no header.
    CompressedPacked(Wrapper),
}

impl LegacyLayout {
    /// Every layout, including each compression wrapper.
    pub fn all() -> Vec<LegacyLayout> {
        let mut layouts: Vec<LegacyLayout> = ContainerFormat::DISPATCH_ORDER
            .into_iter()
            .map(LegacyLayout::Container)
            .collect();
        layouts.push(LegacyLayout::BarePacked);
        layouts.push(LegacyLayout::LegacyMarker);
        for wrapper in Wrapper::ALL {
            layouts.push(LegacyLayout::CompressedJson(wrapper));
            layouts.push(LegacyLayout::CompressedPacked(wrapper));
        }
        layouts
    }

    /// The ladder stage expected to recognise this layout.
    ///
    /// Holds for map snapshots. A scalar root can be mistaken for an earlier
    /// stage (a packed `48` is the JSON text `0`).
    pub fn expected_stage(self) -> DecodeStage {
        match self {
            LegacyLayout::Container(format) => DecodeStage::Container(Some(format)),
            LegacyLayout::BarePacked => DecodeStage::BarePacked,
            LegacyLayout::LegacyMarker => DecodeStage::LegacyMarker,
            LegacyLayout::CompressedJson(_) => DecodeStage::CompressedJson,
            LegacyLayout::CompressedPacked(_) => DecodeStage::CompressedPacked,
        }
    }
}

/// Builds the bytes of `value` in the given layout.
///
/// # Errors
///
/// Returns an error if packing fails. Compression into memory does not fail.
pub fn legacy_bytes(value: &Value, layout: LegacyLayout) -> CodecResult<Vec<u8>> {
    let bytes = match layout {
        LegacyLayout::Container(format) => return encode_container(value, format),
        LegacyLayout::BarePacked => to_packed(value)?,
        LegacyLayout::LegacyMarker => {
            let mut out = LEGACY_MARKER.to_vec();
            out.extend_from_slice(&to_packed(value)?);
            out
        }
        LegacyLayout::CompressedJson(wrapper) => {
            let text = serde_json::to_vec(value)
                .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
            compress(wrapper, &text)?
        }
        LegacyLayout::CompressedPacked(wrapper) => compress(wrapper, &to_packed(value)?)?,
    };
    Ok(bytes)
}

fn compress(wrapper: Wrapper, data: &[u8]) -> CodecResult<Vec<u8>> {
    wrapper
        .compress(data)
        .map_err(|e| CodecError::compression(e.to_string()))
}

/// A character card with `chats` chat logs of `messages` messages each.
pub fn character(name: &str, chats: usize, messages: usize) -> Value {
    let chat_list = (0..chats)
        .map(|chat| {
            let log = (0..messages)
                .map(|n| {
                    Value::map([
                        ("role", Value::from(if n % 2 == 0 { "user" } else { "char" })),
                        ("data", Value::from(format!("{name} message {chat}.{n}"))),
                    ])
                })
                .collect();
            Value::map([
                ("name", Value::from(format!("Chat {chat}"))),
                ("message", Value::Array(log)),
            ])
        })
        .collect();
    Value::map([
        ("name", Value::from(name)),
        ("firstMessage", Value::from(format!("Hello, I am {name}."))),
        ("chats", Value::Array(chat_list)),
        ("chatPage", Value::Integer(0)),
    ])
}

/// A database with the given characters.
pub fn database_with(characters: &[&str]) -> Value {
    Value::map([
        ("formatversion", Value::Integer(3)),
        ("apiType", Value::from("openai")),
        ("temperature", Value::Float(0.7)),
        ("maxContext", Value::Integer(4000)),
        (
            "characters",
            Value::Array(
                characters
                    .iter()
                    .map(|name| character(name, 1, 4))
                    .collect(),
            ),
        ),
        ("botPresets", Value::Array(vec![])),
        ("customBackground", Value::Null),
        ("fullScreen", Value::Bool(false)),
    ])
}

/// A small representative database.
pub fn sample_database() -> Value {
    database_with(&["Risu", "Aris"])
}

/// A database large enough to span many stream chunks.
pub fn large_database(characters: usize) -> Value {
    let names: Vec<String> = (0..characters).map(|n| format!("character-{n}")).collect();
    let mut db = database_with(&[]);
    let list = names
        .iter()
        .map(|name| character(name, 3, 40))
        .collect();
    db.insert("characters", Value::Array(list));
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use risusave_codec::decode_container_detailed;

    #[test]
    fn every_layout_decodes_at_its_stage() {
        let db = sample_database();
        for layout in LegacyLayout::all() {
            let bytes = legacy_bytes(&db, layout).unwrap();
            let decoded = decode_container_detailed(&bytes).unwrap();
            assert_eq!(decoded.value, db, "{layout:?}");
            assert_eq!(decoded.stage, layout.expected_stage(), "{layout:?}");
        }
    }

    #[test]
    fn legacy_marker_prefix() {
        let bytes = legacy_bytes(&Value::object(), LegacyLayout::LegacyMarker).unwrap();
        assert_eq!(&bytes[..6], b"\0\0RISU");
        assert_eq!(bytes[6], 0x80);
    }

    #[test]
    fn large_database_shape() {
        let db = large_database(5);
        assert_eq!(db.get("characters").unwrap().len(), 5);
        assert!(serde_json::to_vec(&db).unwrap().len() > 20_000);
    }
}
