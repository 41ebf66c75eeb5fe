//! Inspect command implementation.

use risusave_codec::{structural_hash, ContainerFormat, DecodeStage, Value};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Save file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// File path.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Decode stage that recognised the file.
    pub stage: String,
    /// Container format, when the file has a known header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Container version byte, when the file has a known header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    /// Kind of the top-level value.
    pub root_kind: String,
    /// Number of top-level entries.
    pub root_len: usize,
    /// Structural hash of the snapshot.
    pub hash: String,
    /// Top-level keys with the kind and size of each value (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<KeyStats>>,
}

/// Summary of one top-level entry.
#[derive(Debug, Serialize)]
pub struct KeyStats {
    /// Key name.
    pub key: String,
    /// Kind of the value.
    pub kind: String,
    /// Number of entries in the value (zero for scalars).
    pub len: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_keys: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let size = fs::metadata(path)?.len();
    let decoded = super::load(path)?;
    let result = summarize(path, size, &decoded.value, decoded.stage, show_keys);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Builds the inspection summary for a decoded snapshot.
pub fn summarize(
    path: &Path,
    size: u64,
    value: &Value,
    stage: DecodeStage,
    show_keys: bool,
) -> InspectResult {
    let container: Option<ContainerFormat> = match stage {
        DecodeStage::Container(format) => format,
        _ => None,
    };
    let keys = show_keys.then(|| {
        value
            .as_map()
            .into_iter()
            .flatten()
            .map(|(key, v)| KeyStats {
                key: key.clone(),
                kind: v.kind().to_string(),
                len: v.len(),
            })
            .collect()
    });

    InspectResult {
        path: path.display().to_string(),
        size,
        stage: stage.name().to_string(),
        format: container.map(|f| f.name().to_string()),
        version: container.map(ContainerFormat::version),
        root_kind: value.kind().to_string(),
        root_len: value.len(),
        hash: structural_hash(value).to_string(),
        keys,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Save file: {}", result.path);
    println!();
    println!("Container:");
    println!("  Size:    {} bytes", result.size);
    println!("  Stage:   {}", result.stage);
    if let (Some(format), Some(version)) = (&result.format, result.version) {
        println!("  Format:  {format} (version {version})");
    }
    println!();
    println!("Snapshot:");
    println!("  Root:    {} with {} entries", result.root_kind, result.root_len);
    println!("  Hash:    {}", result.hash);

    if let Some(keys) = &result.keys {
        println!();
        println!("Keys:");
        for stats in keys {
            println!("  {:<32} {:<8} {}", stats.key, stats.kind, stats.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_container() {
        let value = Value::map([
            ("characters", Value::Array(vec![Value::Null, Value::Null])),
            ("name", Value::from("risu")),
        ]);
        let result = summarize(
            Path::new("db.bin"),
            42,
            &value,
            DecodeStage::Container(Some(ContainerFormat::StreamCompressed)),
            true,
        );
        assert_eq!(result.stage, "container");
        assert_eq!(result.format.as_deref(), Some("stream"));
        assert_eq!(result.version, Some(9));
        assert_eq!(result.root_kind, "object");
        assert_eq!(result.root_len, 2);

        let keys = result.keys.unwrap();
        assert_eq!(keys[0].key, "characters");
        assert_eq!(keys[0].len, 2);
    }

    #[test]
    fn summary_of_legacy_file() {
        let result = summarize(
            Path::new("old.bin"),
            3,
            &Value::object(),
            DecodeStage::BarePacked,
            false,
        );
        assert_eq!(result.stage, "bare-packed");
        assert!(result.format.is_none());
        assert!(result.keys.is_none());
        assert_eq!(result.hash, "11");
    }
}
