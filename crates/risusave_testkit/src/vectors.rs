//! Shared test vectors for RisuSave.
//!
//! Browser clients compute the same structural hash and read the same
//! containers, so these vectors pin both byte-for-byte.

use risusave_codec::Value;
use serde::{Deserialize, Serialize};

/// A test vector that can be shared across implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input snapshot as JSON text.
    pub input_json: String,
    /// Expected output (hex for bytes, lowercase hash text for hashes).
    pub expected: String,
}

impl TestVector {
    fn new(id: &str, description: &str, input_json: &str, expected: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input_json: input_json.into(),
            expected: expected.into(),
        }
    }

    /// Parses the input snapshot.
    pub fn input(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.input_json)
    }

    /// Decodes `expected` as hex bytes.
    pub fn expected_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.expected)
    }
}

/// Structural hash vectors.
pub fn hash_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new("hash_null", "null", "null", "25"),
        TestVector::new("hash_true", "boolean true", "true", "3c2"),
        TestVector::new("hash_false", "boolean false", "false", "3c1"),
        TestVector::new("hash_zero", "integer 0", "0", "383"),
        TestVector::new("hash_one", "integer 1", "1", "384"),
        TestVector::new("hash_minus_one", "integer -1 wraps", "-1", "382"),
        TestVector::new("hash_integral_float", "1.0 hashes like 1", "1.0", "384"),
        TestVector::new("hash_empty_string", "empty string", "\"\"", "811ca08e"),
        TestVector::new("hash_empty_array", "empty array", "[]", "13"),
        TestVector::new("hash_array_one", "array holding 1", "[1]", "5d1"),
        TestVector::new("hash_array_null", "array holding null", "[null]", "272"),
        TestVector::new("hash_empty_object", "empty object", "{}", "11"),
        TestVector::new("hash_object_one_key", "single key", r#"{"a":1}"#, "9d79563e"),
        TestVector::new("hash_object_two_keys", "two keys", r#"{"a":1,"b":2}"#, "6700bea9"),
        TestVector::new(
            "hash_object_reordered",
            "key order does not matter",
            r#"{"b":2,"a":1}"#,
            "6700bea9",
        ),
    ]
}

/// Packed encoding vectors.
pub fn packed_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new("packed_null", "nil", "null", "c0"),
        TestVector::new("packed_true", "true", "true", "c3"),
        TestVector::new("packed_false", "false", "false", "c2"),
        TestVector::new("packed_fixint", "positive fixint", "1", "01"),
        TestVector::new("packed_uint8", "uint 8", "200", "ccc8"),
        TestVector::new("packed_uint16", "uint 16", "256", "cd0100"),
        TestVector::new("packed_neg_fixint", "negative fixint", "-1", "ff"),
        TestVector::new("packed_int8", "int 8", "-33", "d0df"),
        TestVector::new("packed_float", "floats are float64", "1.5", "cb3ff8000000000000"),
        TestVector::new("packed_fixstr", "fixstr", "\"a\"", "a161"),
        TestVector::new("packed_fixarray", "empty fixarray", "[]", "90"),
        TestVector::new("packed_fixmap", "fixmap", r#"{"a":1}"#, "81a16101"),
    ]
}

/// Raw container vectors.
pub fn container_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new(
            "container_raw_empty",
            "raw container of an empty database",
            "{}",
            "005249535553415645000780",
        ),
        TestVector::new(
            "container_raw_one_key",
            "raw container of a one-key database",
            r#"{"a":1}"#,
            "005249535553415645000781a16101",
        ),
    ]
}

/// All test vectors.
pub fn all_vectors() -> Vec<TestVector> {
    let mut vectors = hash_vectors();
    vectors.extend(packed_vectors());
    vectors.extend(container_vectors());
    vectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use risusave_codec::{decode_container, encode_legacy, from_packed, structural_hash, to_packed};

    #[test]
    fn hash_vectors_match() {
        for vector in hash_vectors() {
            let value = vector.input().unwrap();
            assert_eq!(
                structural_hash(&value).to_string(),
                vector.expected,
                "{}",
                vector.id
            );
        }
    }

    #[test]
    fn packed_vectors_match() {
        for vector in packed_vectors() {
            let value = vector.input().unwrap();
            let expected = vector.expected_bytes().unwrap();
            assert_eq!(to_packed(&value).unwrap(), expected, "{}", vector.id);
            assert_eq!(from_packed(&expected).unwrap(), value, "{}", vector.id);
        }
    }

    #[test]
    fn container_vectors_match() {
        for vector in container_vectors() {
            let value = vector.input().unwrap();
            let expected = vector.expected_bytes().unwrap();
            assert_eq!(encode_legacy(&value).unwrap(), expected, "{}", vector.id);
            assert_eq!(decode_container(&expected).unwrap(), value, "{}", vector.id);
        }
    }

    #[test]
    fn vector_ids_are_unique() {
        let vectors = all_vectors();
        let mut ids: Vec<_> = vectors.iter().map(|v| v.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), vectors.len());
    }
}
