//! Hash command implementation.

use risusave_codec::{structural_hash, StructuralHash, Value};
use std::fs;
use std::path::Path;

/// Where the value to hash comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashInput {
    /// A save file in any supported format.
    Container,
    /// JSON text.
    Json,
}

/// Runs the hash command.
pub fn run(path: &Path, input: HashInput) -> Result<(), Box<dyn std::error::Error>> {
    let value = match input {
        HashInput::Container => super::load(path)?.value,
        HashInput::Json => parse_json(&fs::read(path)?)?,
    };
    println!("{}", hash_of(&value));
    Ok(())
}

/// Parses JSON text into a snapshot.
pub fn parse_json(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Returns the structural hash a client would send as `expectedHash`.
pub fn hash_of(value: &Value) -> StructuralHash {
    structural_hash(value)
}
