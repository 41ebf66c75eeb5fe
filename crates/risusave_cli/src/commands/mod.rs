//! CLI command implementations.

pub mod convert;
pub mod diff;
pub mod hash;
pub mod inspect;

use risusave_codec::{decode_container_detailed, Decoded};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reads and decodes a save file of any supported format.
pub fn load(path: &Path) -> Result<Decoded, Box<dyn std::error::Error>> {
    let bytes = fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let decoded = decode_container_detailed(&bytes)?;
    debug!(path = %path.display(), stage = %decoded.stage, "decoded save file");
    Ok(decoded)
}
