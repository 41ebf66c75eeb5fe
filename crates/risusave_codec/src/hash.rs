//! Structural hash used as the optimistic-concurrency token.
//!
//! The hash is a 32-bit fingerprint computed bottom-up over a [`Value`]:
//!
//! | kind    | hash                                              |
//! |---------|---------------------------------------------------|
//! | null    | `37`                                              |
//! | boolean | `31 * 31 + (1 or 0)`                              |
//! | number  | `29 * 31 + n` (32-bit ints) or FNV-1a of its text |
//! | string  | `23 * 31 + fnv1a(utf8)`                           |
//! | array   | `acc = acc * 31 + h(item)`, starting at `19`      |
//! | object  | `acc ^= h(key) * 31 + h(value)`, starting at `17` |
//!
//! All arithmetic wraps modulo 2^32. Object fields are folded with XOR, so
//! the result does not depend on key order.

use crate::number::format_js_number;
use crate::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MULTIPLIER: u32 = 31;
const OBJECT_SEED: u32 = 17;
const ARRAY_SEED: u32 = 19;
const STRING_SEED: u32 = 23;
const NUMBER_SEED: u32 = 29;
const BOOLEAN_SEED: u32 = 31;
const NULL_SEED: u32 = 37;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// A 32-bit structural fingerprint of a [`Value`].
///
/// Displays and serializes as lowercase hex without padding (`11`, `9d79563e`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructuralHash(pub u32);

impl StructuralHash {
    /// Returns the raw hash value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StructuralHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl FromStr for StructuralHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u32::from_str_radix(s, 16).map(StructuralHash)
    }
}

impl Serialize for StructuralHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StructuralHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Computes the structural hash of a value.
pub fn structural_hash(value: &Value) -> StructuralHash {
    StructuralHash(hash_value(value))
}

fn hash_value(value: &Value) -> u32 {
    match value {
        Value::Null => NULL_SEED,
        Value::Bool(b) => BOOLEAN_SEED
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(u32::from(*b)),
        Value::Integer(n) => combine_number(integer_hash(*n)),
        Value::Float(f) => combine_number(float_hash(*f)),
        Value::Text(s) => hash_text(s),
        Value::Array(items) => items.iter().fold(ARRAY_SEED, |acc, item| {
            acc.wrapping_mul(MULTIPLIER).wrapping_add(hash_value(item))
        }),
        Value::Map(pairs) => pairs.iter().fold(OBJECT_SEED, |acc, (key, value)| {
            acc ^ hash_text(key)
                .wrapping_mul(MULTIPLIER)
                .wrapping_add(hash_value(value))
        }),
    }
}

fn hash_text(text: &str) -> u32 {
    STRING_SEED
        .wrapping_mul(MULTIPLIER)
        .wrapping_add(fnv1a(text.as_bytes()))
}

fn combine_number(number_hash: u32) -> u32 {
    NUMBER_SEED
        .wrapping_mul(MULTIPLIER)
        .wrapping_add(number_hash)
}

#[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn integer_hash(n: i64) -> u32 {
    match i32::try_from(n) {
        Ok(small) => small as u32,
        Err(_) => fnv1a(format_js_number(n as f64).as_bytes()),
    }
}

#[allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::float_cmp
)]
fn float_hash(f: f64) -> u32 {
    let in_range = f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX);
    if in_range && f.trunc() == f {
        // Integral and within range, so the cast is exact. -0.0 maps to 0.
        return (f as i32) as u32;
    }
    fnv1a(format_js_number(f).as_bytes())
}

/// 32-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
