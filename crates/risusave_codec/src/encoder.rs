//! Packed (MessagePack) encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use indexmap::IndexMap;

/// Encode a value to its packed byte form.
///
/// The output matches what a MessagePack encoder configured without record
/// extensions produces:
/// - Integers use the shortest possible encoding
/// - Floats are always written as float64
/// - Map keys are written as strings, in insertion order
///
/// # Errors
///
/// Returns an error if a string, array or map is longer than the format can
/// describe (more than `u32::MAX` elements or bytes).
pub fn to_packed(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = PackedEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A packed encoder writing into an owned buffer.
pub struct PackedEncoder {
    buffer: Vec<u8>,
}

impl PackedEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => {
                self.buffer.push(0xc0);
                Ok(())
            }
            Value::Bool(b) => {
                self.buffer.push(if *b { 0xc3 } else { 0xc2 });
                Ok(())
            }
            Value::Integer(n) => {
                self.encode_integer(*n);
                Ok(())
            }
            Value::Float(f) => {
                self.buffer.push(0xcb);
                self.buffer.extend_from_slice(&f.to_be_bytes());
                Ok(())
            }
            Value::Text(s) => self.encode_text(s),
            Value::Array(items) => self.encode_array(items),
            Value::Map(pairs) => self.encode_map(pairs),
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            let value = n as u64;
            if value < 0x80 {
                self.buffer.push(value as u8);
            } else if value <= u64::from(u8::MAX) {
                self.buffer.push(0xcc);
                self.buffer.push(value as u8);
            } else if value <= u64::from(u16::MAX) {
                self.buffer.push(0xcd);
                self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
            } else if value <= u64::from(u32::MAX) {
                self.buffer.push(0xce);
                self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
            } else {
                self.buffer.push(0xcf);
                self.buffer.extend_from_slice(&value.to_be_bytes());
            }
        } else if n >= -32 {
            // negative fixint: 0xe0..=0xff
            self.buffer.push(n as i8 as u8);
        } else if n >= i64::from(i8::MIN) {
            self.buffer.push(0xd0);
            self.buffer.push(n as i8 as u8);
        } else if n >= i64::from(i16::MIN) {
            self.buffer.push(0xd1);
            self.buffer.extend_from_slice(&(n as i16).to_be_bytes());
        } else if n >= i64::from(i32::MIN) {
            self.buffer.push(0xd2);
            self.buffer.extend_from_slice(&(n as i32).to_be_bytes());
        } else {
            self.buffer.push(0xd3);
            self.buffer.extend_from_slice(&n.to_be_bytes());
        }
    }

    /// Writes a length prefix using the fix/8/16/32 family of a container type.
    #[allow(clippy::cast_possible_truncation)]
    fn encode_length(
        &mut self,
        len: usize,
        fix: Option<(u8, usize)>,
        wide: [Option<u8>; 3],
        type_name: &str,
    ) -> CodecResult<()> {
        if let Some((base, limit)) = fix {
            if len < limit {
                self.buffer.push(base | len as u8);
                return Ok(());
            }
        }
        let [marker8, marker16, marker32] = wide;
        if let Some(marker) = marker8 {
            if len <= usize::from(u8::MAX) {
                self.buffer.push(marker);
                self.buffer.push(len as u8);
                return Ok(());
            }
        }
        if let Some(marker) = marker16 {
            if len <= usize::from(u16::MAX) {
                self.buffer.push(marker);
                self.buffer.extend_from_slice(&(len as u16).to_be_bytes());
                return Ok(());
            }
        }
        match (marker32, u32::try_from(len)) {
            (Some(marker), Ok(len)) => {
                self.buffer.push(marker);
                self.buffer.extend_from_slice(&len.to_be_bytes());
                Ok(())
            }
            _ => Err(CodecError::encoding_failed(format!(
                "{type_name} of length {len} is too long"
            ))),
        }
    }

    fn encode_text(&mut self, text: &str) -> CodecResult<()> {
        self.encode_length(
            text.len(),
            Some((0xa0, 32)),
            [Some(0xd9), Some(0xda), Some(0xdb)],
            "string",
        )?;
        self.buffer.extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn encode_array(&mut self, items: &[Value]) -> CodecResult<()> {
        self.encode_length(
            items.len(),
            Some((0x90, 16)),
            [None, Some(0xdc), Some(0xdd)],
            "array",
        )?;
        for item in items {
            self.encode(item)?;
        }
        Ok(())
    }

    fn encode_map(&mut self, pairs: &IndexMap<String, Value>) -> CodecResult<()> {
        self.encode_length(
            pairs.len(),
            Some((0x80, 16)),
            [None, Some(0xde), Some(0xdf)],
            "map",
        )?;
        for (key, value) in pairs {
            self.encode_text(key)?;
            self.encode(value)?;
        }
        Ok(())
    }
}

impl Default for PackedEncoder {
    fn default() -> Self {
        Self::new()
    }
}
