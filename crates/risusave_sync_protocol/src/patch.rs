//! Applying patch operations to a snapshot.

use crate::convert::{from_json_value, to_json_value};
use crate::error::PatchError;
use crate::operation::PatchOperation;
use risusave_codec::Value;

/// Applies `ops` to `doc` in place and returns the number applied.
///
/// Every operation is validated against the document as it stands when the
/// operation runs. The patch is applied as a whole: on error `doc` is left
/// as it was.
///
/// # Errors
///
/// Returns a [`PatchError`] naming the first operation that could not be
/// applied.
pub fn apply_patch(doc: &mut Value, ops: &[PatchOperation]) -> Result<usize, PatchError> {
    let (patched, applied) = apply_patch_cloned(doc, ops)?;
    *doc = patched;
    Ok(applied)
}

/// Applies `ops` to a copy of `doc`, leaving `doc` untouched.
///
/// # Errors
///
/// Returns a [`PatchError`] naming the first operation that could not be
/// applied.
pub fn apply_patch_cloned(
    doc: &Value,
    ops: &[PatchOperation],
) -> Result<(Value, usize), PatchError> {
    let library_ops = ops
        .iter()
        .enumerate()
        .map(|(index, op)| to_library_op(index, op))
        .collect::<Result<Vec<_>, _>>()?;

    let mut json = to_json_value(doc);
    json_patch::patch(&mut json, &library_ops).map_err(|e| PatchError::Rejected {
        index: e.operation,
        path: e.path.to_string(),
        reason: e.kind.to_string(),
    })?;
    Ok((from_json_value(json), ops.len()))
}

/// Both enums share the RFC 6902 object form, so the wire shape is the
/// bridge. Only an unparsable pointer fails here.
fn to_library_op(
    index: usize,
    op: &PatchOperation,
) -> Result<json_patch::PatchOperation, PatchError> {
    let malformed = |e: serde_json::Error| PatchError::Malformed {
        index,
        reason: e.to_string(),
    };
    let wire = serde_json::to_value(op).map_err(malformed)?;
    serde_json::from_value(wire).map_err(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    fn ops(text: &str) -> Vec<PatchOperation> {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn add_to_object() {
        let mut doc = parse(r#"{"a":1}"#);
        let applied = apply_patch(&mut doc, &ops(r#"[{"op":"add","path":"/b","value":2}]"#)).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(doc, parse(r#"{"a":1,"b":2}"#));
    }

    #[test]
    fn add_to_array_positions() {
        let mut doc = parse("[1,3]");
        apply_patch(
            &mut doc,
            &ops(r#"[
                {"op":"add","path":"/1","value":2},
                {"op":"add","path":"/-","value":4},
                {"op":"add","path":"/4","value":5}
            ]"#),
        )
        .unwrap();
        assert_eq!(doc, parse("[1,2,3,4,5]"));
    }

    #[test]
    fn add_out_of_bounds_fails() {
        let mut doc = parse("[1]");
        let err = apply_patch(&mut doc, &ops(r#"[{"op":"add","path":"/5","value":0}]"#)).unwrap_err();
        assert!(matches!(err, PatchError::Rejected { index: 0, .. }));
        assert_eq!(doc, parse("[1]"));
    }

    #[test]
    fn remove_and_replace() {
        let mut doc = parse(r#"{"a":[1,2,3],"b":{"c":true}}"#);
        apply_patch(
            &mut doc,
            &ops(r#"[
                {"op":"remove","path":"/a/1"},
                {"op":"replace","path":"/b/c","value":false}
            ]"#),
        )
        .unwrap();
        assert_eq!(doc, parse(r#"{"a":[1,3],"b":{"c":false}}"#));
    }

    #[test]
    fn remove_missing_path_fails_with_index() {
        let mut doc = parse(r#"{"a":1}"#);
        let err = apply_patch(
            &mut doc,
            &ops(r#"[
                {"op":"add","path":"/x","value":1},
                {"op":"remove","path":"/nope"}
            ]"#),
        )
        .unwrap_err();
        assert_eq!(err.op_index(), 1);
        assert!(matches!(err, PatchError::Rejected { .. }));
        // Nothing is applied when a later operation fails.
        assert_eq!(doc, parse(r#"{"a":1}"#));
    }

    #[test]
    fn replace_missing_path_fails() {
        let mut doc = parse(r#"{"a":1}"#);
        assert!(apply_patch(&mut doc, &[PatchOperation::replace("/b", 1i64)]).is_err());
        assert!(apply_patch(&mut doc, &[PatchOperation::replace("/a/b", 1i64)]).is_err());
    }

    #[test]
    fn root_operations() {
        let mut doc = parse(r#"{"a":1}"#);
        apply_patch(&mut doc, &[PatchOperation::replace("", Value::from(vec![1i64]))]).unwrap();
        assert_eq!(doc, parse("[1]"));
        apply_patch(&mut doc, &[PatchOperation::add("", Value::object())]).unwrap();
        assert_eq!(doc, Value::object());
    }

    #[test]
    fn move_and_copy() {
        let mut doc = parse(r#"{"a":{"x":1},"b":[]}"#);
        apply_patch(
            &mut doc,
            &ops(r#"[
                {"op":"copy","from":"/a/x","path":"/b/0"},
                {"op":"move","from":"/a","path":"/c"}
            ]"#),
        )
        .unwrap();
        assert_eq!(doc, parse(r#"{"b":[1],"c":{"x":1}}"#));
    }

    #[test]
    fn move_into_own_child_is_rejected() {
        let mut doc = parse(r#"{"a":{"b":{}}}"#);
        let err = apply_patch(&mut doc, &[PatchOperation::move_from("/a", "/a/b/c")]).unwrap_err();
        assert!(matches!(err, PatchError::Rejected { index: 0, .. }));
        assert_eq!(doc, parse(r#"{"a":{"b":{}}}"#));
    }

    #[test]
    fn move_to_same_location_is_noop() {
        let mut doc = parse(r#"{"a":1}"#);
        apply_patch(&mut doc, &[PatchOperation::move_from("/a", "/a")]).unwrap();
        assert_eq!(doc, parse(r#"{"a":1}"#));
    }

    #[test]
    fn test_operation() {
        let mut doc = parse(r#"{"a":[1,"x"]}"#);
        apply_patch(&mut doc, &[PatchOperation::test("/a", parse(r#"[1,"x"]"#))]).unwrap();
        let err = apply_patch(&mut doc, &[PatchOperation::test("/a/0", 2i64)]).unwrap_err();
        assert!(matches!(err, PatchError::Rejected { index: 0, .. }));
    }

    #[test]
    fn invalid_pointer_and_index() {
        let mut doc = parse(r#"{"a":[1]}"#);
        let err = apply_patch(
            &mut doc,
            &[PatchOperation::add("/b", 1i64), PatchOperation::add("a", 1i64)],
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::Malformed { index: 1, .. }));
        let err = apply_patch(&mut doc, &[PatchOperation::remove("/a/01")]).unwrap_err();
        assert!(matches!(err, PatchError::Rejected { .. }));
        assert_eq!(doc, parse(r#"{"a":[1]}"#));
    }

    #[test]
    fn add_under_scalar_fails() {
        let mut doc = parse(r#"{"a":1}"#);
        let err = apply_patch(&mut doc, &[PatchOperation::add("/a/b", 1i64)]).unwrap_err();
        assert!(matches!(err, PatchError::Rejected { index: 0, .. }));
    }

    #[test]
    fn cloned_form_leaves_source_untouched() {
        let doc = parse(r#"{"a":1}"#);
        let (patched, applied) = apply_patch_cloned(
            &doc,
            &[PatchOperation::add("/b", 2i64), PatchOperation::remove("/a")],
        )
        .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(patched, parse(r#"{"b":2}"#));
        assert_eq!(doc, parse(r#"{"a":1}"#));

        assert!(apply_patch_cloned(&doc, &[PatchOperation::remove("/zzz")]).is_err());
        assert_eq!(doc, parse(r#"{"a":1}"#));
    }
}
