//! Packed (MessagePack) decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use indexmap::IndexMap;

/// Decode a value from packed bytes.
///
/// The whole buffer must hold exactly one value.
///
/// # Errors
///
/// Returns an error if the bytes are not valid packed data, use a type with
/// no JSON counterpart (binary, extensions other than `undefined`), or have
/// trailing bytes.
pub fn from_packed(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = PackedDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A packed decoder over a borrowed buffer.
pub struct PackedDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

/// Maximum allowed element count for arrays and maps.
/// This prevents allocation-based DoS from untrusted input.
const MAX_CONTAINER_ELEMENTS: usize = 16 * 1024 * 1024;

/// Maximum allowed string length.
const MAX_BYTES_LENGTH: usize = 256 * 1024 * 1024;

/// Maximum nesting of arrays and maps.
const MAX_DEPTH: usize = 512;

/// Extension type used by JavaScript encoders for `undefined`.
const UNDEFINED_EXT_TYPE: u8 = 0;

impl<'a> PackedDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let marker = self.read_byte()?;
        match marker {
            0x00..=0x7f => Ok(Value::Integer(i64::from(marker))),
            0x80..=0x8f => self.decode_map(usize::from(marker & 0x0f)),
            0x90..=0x9f => self.decode_array(usize::from(marker & 0x0f)),
            0xa0..=0xbf => self.decode_text(usize::from(marker & 0x1f)),
            0xc0 => Ok(Value::Null),
            0xc1 => Err(CodecError::invalid_structure("reserved marker 0xc1")),
            0xc2 => Ok(Value::Bool(false)),
            0xc3 => Ok(Value::Bool(true)),
            0xc4..=0xc6 => Err(CodecError::unsupported_type("bin")),
            0xc7..=0xc9 => Err(CodecError::unsupported_type("ext")),
            0xca => {
                let bits = u32::from_be_bytes(self.read_array()?);
                Ok(Value::Float(f64::from(f32::from_bits(bits))))
            }
            0xcb => Ok(Value::Float(f64::from_be_bytes(self.read_array()?))),
            0xcc => Ok(Value::Integer(i64::from(self.read_byte()?))),
            0xcd => Ok(Value::Integer(i64::from(u16::from_be_bytes(
                self.read_array()?,
            )))),
            0xce => Ok(Value::Integer(i64::from(u32::from_be_bytes(
                self.read_array()?,
            )))),
            0xcf => {
                let n = u64::from_be_bytes(self.read_array()?);
                Ok(i64::try_from(n).map_or(Value::Float(n as f64), Value::Integer))
            }
            0xd0 => Ok(Value::Integer(i64::from(self.read_byte()? as i8))),
            0xd1 => Ok(Value::Integer(i64::from(i16::from_be_bytes(
                self.read_array()?,
            )))),
            0xd2 => Ok(Value::Integer(i64::from(i32::from_be_bytes(
                self.read_array()?,
            )))),
            0xd3 => Ok(Value::Integer(i64::from_be_bytes(self.read_array()?))),
            0xd4 => {
                let [ext_type, _] = self.read_array::<2>()?;
                if ext_type == UNDEFINED_EXT_TYPE {
                    Ok(Value::Null)
                } else {
                    Err(CodecError::unsupported_type(format!("ext type {ext_type}")))
                }
            }
            0xd5..=0xd8 => Err(CodecError::unsupported_type("ext")),
            0xd9 => {
                let len = usize::from(self.read_byte()?);
                self.decode_text(len)
            }
            0xda => {
                let len = usize::from(u16::from_be_bytes(self.read_array()?));
                self.decode_text(len)
            }
            0xdb => {
                let len = self.read_len32()?;
                self.decode_text(len)
            }
            0xdc => {
                let len = usize::from(u16::from_be_bytes(self.read_array()?));
                self.decode_array(len)
            }
            0xdd => {
                let len = self.read_len32()?;
                self.decode_array(len)
            }
            0xde => {
                let len = usize::from(u16::from_be_bytes(self.read_array()?));
                self.decode_map(len)
            }
            0xdf => {
                let len = self.read_len32()?;
                self.decode_map(len)
            }
            0xe0..=0xff => Ok(Value::Integer(i64::from(marker as i8))),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len32(&mut self) -> CodecResult<usize> {
        let len = u32::from_be_bytes(self.read_array()?);
        usize::try_from(len).map_err(|_| CodecError::invalid_structure("length overflow"))
    }

    fn decode_text(&mut self, len: usize) -> CodecResult<Value> {
        self.read_string(len).map(Value::Text)
    }

    fn read_string(&mut self, len: usize) -> CodecResult<String> {
        if len > MAX_BYTES_LENGTH {
            return Err(CodecError::invalid_structure(format!(
                "string length {len} exceeds maximum {MAX_BYTES_LENGTH}"
            )));
        }
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn enter(&mut self, len: usize) -> CodecResult<()> {
        if len > MAX_CONTAINER_ELEMENTS {
            return Err(CodecError::invalid_structure(format!(
                "container length {len} exceeds maximum {MAX_CONTAINER_ELEMENTS}"
            )));
        }
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CodecError::invalid_structure("nesting too deep"));
        }
        Ok(())
    }

    fn decode_array(&mut self, len: usize) -> CodecResult<Value> {
        self.enter(len)?;
        // Every element takes at least one byte.
        let mut items = Vec::with_capacity(len.min(self.remaining().len()));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, len: usize) -> CodecResult<Value> {
        self.enter(len)?;
        let mut map = Value::Map(IndexMap::with_capacity(len.min(self.remaining().len() / 2)));
        for _ in 0..len {
            let key = self.decode_key()?;
            let value = self.decode()?;
            map.insert(key, value);
        }
        self.depth -= 1;
        Ok(map)
    }

    /// Map keys are strings. Integer keys are accepted and stringified, the
    /// way they read back as object properties.
    fn decode_key(&mut self) -> CodecResult<String> {
        match self.decode()? {
            Value::Text(s) => Ok(s),
            Value::Integer(n) => Ok(n.to_string()),
            other => Err(CodecError::invalid_structure(format!(
                "map key must be a string, got {}",
                other.kind()
            ))),
        }
    }
}
