//! Diff command implementation.

use risusave_codec::structural_hash;
use risusave_sync_protocol::{diff, PatchPlan};
use std::path::Path;

/// Runs the diff command.
///
/// Prints the patch that turns `old` into `new`, either one operation per
/// line or as the plan a client would send.
pub fn run(old: &Path, new: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let old = super::load(old)?.value;
    let new = super::load(new)?.value;
    let patch = diff(&old, &new);

    match format {
        "json" => {
            let plan = PatchPlan {
                patch,
                expected_hash: Some(structural_hash(&old)),
                needs_full_save: false,
            };
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        _ => {
            if patch.is_empty() {
                println!("No differences");
            }
            for op in &patch {
                println!("{:<8} {}", op.name(), op.path());
            }
            println!();
            println!("{} operation(s), base hash {}", patch.len(), structural_hash(&old));
        }
    }

    Ok(())
}
