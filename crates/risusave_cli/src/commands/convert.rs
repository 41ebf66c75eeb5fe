//! Convert command implementation.

use risusave_codec::{encode_container, ContainerFormat, Value};
use std::fs;
use std::path::Path;
use tracing::info;

/// Output of the convert command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A container of the given format.
    Container(ContainerFormat),
    /// Pretty-printed JSON text.
    Json,
}

impl Target {
    /// Parses `raw`, `block`, `stream` or `json`.
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "raw" => Ok(Target::Container(ContainerFormat::Raw)),
            "block" => Ok(Target::Container(ContainerFormat::BlockCompressed)),
            "stream" => Ok(Target::Container(ContainerFormat::StreamCompressed)),
            "json" => Ok(Target::Json),
            other => Err(format!(
                "unknown format {other:?} (expected raw, block, stream or json)"
            )),
        }
    }
}

/// Runs the convert command.
pub fn run(input: &Path, output: &Path, target: Target) -> Result<(), Box<dyn std::error::Error>> {
    let decoded = super::load(input)?;
    let bytes = render(&decoded.value, target)?;
    fs::write(output, &bytes)?;

    info!(
        from = %decoded.stage,
        output = %output.display(),
        bytes = bytes.len(),
        "converted save file"
    );
    println!("✓ Wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

/// Encodes `value` for `target`.
pub fn render(value: &Value, target: Target) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    Ok(match target {
        Target::Container(format) => encode_container(value, format)?,
        Target::Json => serde_json::to_vec_pretty(value)?,
    })
}
