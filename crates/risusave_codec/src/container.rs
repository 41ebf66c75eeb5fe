//! Versioned save container and the decode ladder.
//!
//! A container is an 11-byte header (a 9-byte tag plus a 2-byte version
//! marker) followed by the packed snapshot, optionally gzip-compressed.
//! Older saves predate the header, so decoding walks an ordered list of
//! stages and returns the first that succeeds.

use crate::decoder::from_packed;
use crate::encoder::to_packed;
use crate::error::{CodecError, CodecResult, DecodeAttempt, DecodeError};
use crate::value::Value;
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt;
use std::io::{Read, Write};

/// The 9-byte tag every versioned container starts with (`"\0RISUSAVE"`).
pub const MAGIC_TAG: [u8; 9] = [0x00, 0x52, 0x49, 0x53, 0x55, 0x53, 0x41, 0x56, 0x45];

/// Total header length: tag plus 2-byte version marker.
pub const HEADER_LEN: usize = 11;

/// Prefix of the pre-header legacy format (`"\0\0RISU"`).
pub const LEGACY_MARKER: [u8; 6] = [0x00, 0x00, 0x52, 0x49, 0x53, 0x55];

/// A versioned container variant.
///
/// Version markers are a durable contract. A new revision gets a new marker
/// and a new variant; existing markers are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Packed payload, no compression (`00 07`).
    Raw,
    /// Whole-buffer compressed payload (`00 08`).
    BlockCompressed,
    /// Stream-compressed payload (`00 09`).
    StreamCompressed,
}

impl ContainerFormat {
    /// Formats in header dispatch order, newest first.
    pub const DISPATCH_ORDER: [ContainerFormat; 3] = [
        ContainerFormat::StreamCompressed,
        ContainerFormat::BlockCompressed,
        ContainerFormat::Raw,
    ];

    /// The version byte following the tag.
    pub fn version(self) -> u8 {
        match self {
            ContainerFormat::Raw => 7,
            ContainerFormat::BlockCompressed => 8,
            ContainerFormat::StreamCompressed => 9,
        }
    }

    /// The full 11-byte header.
    pub fn header(self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[..MAGIC_TAG.len()].copy_from_slice(&MAGIC_TAG);
        header[HEADER_LEN - 1] = self.version();
        header
    }

    /// Short name used in logs and tooling.
    pub fn name(self) -> &'static str {
        match self {
            ContainerFormat::Raw => "raw",
            ContainerFormat::BlockCompressed => "block",
            ContainerFormat::StreamCompressed => "stream",
        }
    }

    /// Returns true if the payload is compressed.
    pub fn is_compressed(self) -> bool {
        !matches!(self, ContainerFormat::Raw)
    }

    /// Identifies the container format from a buffer's header, if any.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..HEADER_LEN)?;
        Self::DISPATCH_ORDER
            .into_iter()
            .find(|format| header == format.header())
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A step of the decode ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// A recognised versioned header. Carries the detected format once known.
    Container(Option<ContainerFormat>),
    /// The header-less packed format.
    BarePacked,
    /// Packed data behind the legacy fixed marker.
    LegacyMarker,
    /// Compressed JSON text.
    CompressedJson,
    /// Compressed packed data without a header.
    CompressedPacked,
}

impl DecodeStage {
    /// The stages in the order they are tried.
    pub const LADDER: [DecodeStage; 5] = [
        DecodeStage::Container(None),
        DecodeStage::BarePacked,
        DecodeStage::LegacyMarker,
        DecodeStage::CompressedJson,
        DecodeStage::CompressedPacked,
    ];

    /// Stable stage name.
    pub fn name(self) -> &'static str {
        match self {
            DecodeStage::Container(_) => "container",
            DecodeStage::BarePacked => "bare-packed",
            DecodeStage::LegacyMarker => "legacy-marker",
            DecodeStage::CompressedJson => "compressed-json",
            DecodeStage::CompressedPacked => "compressed-packed",
        }
    }
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStage::Container(Some(format)) => write!(f, "container ({format})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A decoded snapshot together with the stage that recognised it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The snapshot.
    pub value: Value,
    /// The ladder stage that succeeded.
    pub stage: DecodeStage,
}

/// Encodes a snapshot into a container of the given format.
///
/// Both compressed formats write gzip.
///
/// # Errors
///
/// Returns an error if the value cannot be packed or compression fails.
pub fn encode_container(value: &Value, format: ContainerFormat) -> CodecResult<Vec<u8>> {
    let packed = to_packed(value)?;
    let mut out = Vec::with_capacity(HEADER_LEN + packed.len());
    out.extend_from_slice(&format.header());
    if !format.is_compressed() {
        out.extend_from_slice(&packed);
        return Ok(out);
    }
    let mut encoder = GzEncoder::new(out, Compression::default());
    encoder
        .write_all(&packed)
        .map_err(|e| CodecError::compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CodecError::compression(e.to_string()))
}

/// Encodes in the uncompressed raw format, as the server always writes.
///
/// # Errors
///
/// Returns an error if the value cannot be packed.
pub fn encode_legacy(value: &Value) -> CodecResult<Vec<u8>> {
    encode_container(value, ContainerFormat::Raw)
}

/// Encodes in the newest (stream-compressed) format.
///
/// # Errors
///
/// Returns an error if the value cannot be packed or compression fails.
pub fn encode_modern(value: &Value) -> CodecResult<Vec<u8>> {
    encode_container(value, ContainerFormat::StreamCompressed)
}

/// Decodes any supported container or legacy save.
///
/// # Errors
///
/// Returns a [`DecodeError`] listing every attempted stage when none succeeds.
pub fn decode_container(bytes: &[u8]) -> Result<Value, DecodeError> {
    decode_container_detailed(bytes).map(|decoded| decoded.value)
}

/// Decodes like [`decode_container`] and reports which stage succeeded.
///
/// # Errors
///
/// Returns a [`DecodeError`] listing every attempted stage when none succeeds.
pub fn decode_container_detailed(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let mut ladder = Ladder::new(bytes);
    let mut attempts = Vec::new();
    for stage in DecodeStage::LADDER {
        match ladder.try_stage(stage) {
            Ok(decoded) => return Ok(decoded),
            Err(err) => attempts.push(DecodeAttempt {
                stage: stage.name(),
                reason: err.to_string(),
            }),
        }
    }
    Err(DecodeError {
        len: bytes.len(),
        attempts,
    })
}

/// Inflates gzip, zlib or raw deflate data, picking the format from the
/// first bytes.
///
/// # Errors
///
/// Returns a compression error if the input is empty or not valid for the
/// detected format.
pub fn decompress_auto(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    let result = match bytes {
        [] => return Err(CodecError::compression("empty input")),
        [0x1f, 0x8b, 0x08, ..] => MultiGzDecoder::new(bytes).read_to_end(&mut out),
        [first, second, ..] if is_zlib_header(*first, *second) => {
            ZlibDecoder::new(bytes).read_to_end(&mut out)
        }
        _ => DeflateDecoder::new(bytes).read_to_end(&mut out),
    };
    result.map_err(|e| CodecError::compression(e.to_string()))?;
    Ok(out)
}

/// CMF/FLG check from RFC 1950: deflate method, window <= 32K, checksum.
fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    cmf & 0x0f == 8 && cmf >> 4 <= 7 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

/// Decode state shared across stages so the buffer is inflated at most once.
struct Ladder<'a> {
    bytes: &'a [u8],
    inflated: Option<CodecResult<Vec<u8>>>,
}

impl<'a> Ladder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            inflated: None,
        }
    }

    fn inflated(&mut self) -> CodecResult<&[u8]> {
        let bytes = self.bytes;
        match self.inflated.get_or_insert_with(|| decompress_auto(bytes)) {
            Ok(data) => Ok(data),
            Err(err) => Err(err.clone()),
        }
    }

    fn try_stage(&mut self, stage: DecodeStage) -> CodecResult<Decoded> {
        let value = match stage {
            DecodeStage::Container(_) => {
                let format = ContainerFormat::detect(self.bytes)
                    .ok_or_else(|| CodecError::decoding_failed("no container header"))?;
                let payload = &self.bytes[HEADER_LEN..];
                let value = if format.is_compressed() {
                    from_packed(&decompress_auto(payload)?)?
                } else {
                    from_packed(payload)?
                };
                return Ok(Decoded {
                    value,
                    stage: DecodeStage::Container(Some(format)),
                });
            }
            DecodeStage::BarePacked => from_packed(self.bytes)?,
            DecodeStage::LegacyMarker => {
                let rest = self
                    .bytes
                    .strip_prefix(&LEGACY_MARKER[..])
                    .ok_or_else(|| CodecError::decoding_failed("legacy marker absent"))?;
                from_packed(rest)?
            }
            DecodeStage::CompressedJson => {
                let text = self.inflated()?;
                serde_json::from_slice(text)
                    .map_err(|e| CodecError::decoding_failed(e.to_string()))?
            }
            DecodeStage::CompressedPacked => from_packed(self.inflated()?)?,
        };
        Ok(Decoded { value, stage })
    }
}
