//! Structural diff between two snapshots.

use crate::convert::{from_json_value, to_json_value};
use crate::operation::PatchOperation;
use risusave_codec::Value;

/// Computes the patch that turns `source` into `target`.
///
/// Keys present in both documents are compared recursively. Removed keys get
/// a `remove`, new keys an `add`, and changed leaves or containers of a
/// different kind a `replace`. Differing roots that are not containers of
/// the same kind yield a single `replace` of the whole document.
///
/// The output is deterministic for equal inputs and never contains `test`.
pub fn diff(source: &Value, target: &Value) -> Vec<PatchOperation> {
    json_patch::diff(&to_json_value(source), &to_json_value(target))
        .0
        .into_iter()
        .map(from_library_op)
        .collect()
}

fn from_library_op(op: json_patch::PatchOperation) -> PatchOperation {
    use json_patch::PatchOperation as Op;
    match op {
        Op::Add(op) => PatchOperation::add(op.path.to_string(), from_json_value(op.value)),
        Op::Remove(op) => PatchOperation::remove(op.path.to_string()),
        Op::Replace(op) => {
            PatchOperation::replace(op.path.to_string(), from_json_value(op.value))
        }
        Op::Move(op) => PatchOperation::move_from(op.from.to_string(), op.path.to_string()),
        Op::Copy(op) => PatchOperation::copy_from(op.from.to_string(), op.path.to_string()),
        Op::Test(op) => PatchOperation::test(op.path.to_string(), from_json_value(op.value)),
    }
}
