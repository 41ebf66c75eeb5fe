//! Property tests across the codec and the patch protocol.

use proptest::prelude::*;
use risusave_codec::{
    decode_container, decode_container_detailed, encode_container, structural_hash,
    ContainerFormat, Value,
};
use risusave_sync_protocol::{apply_patch, diff, from_json, to_json, PatchOperation};
use risusave_testkit::prelude::*;

fn reversed(value: &Value) -> Value {
    match value {
        Value::Map(pairs) => Value::Map(
            pairs
                .iter()
                .rev()
                .map(|(key, v)| (key.clone(), reversed(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(reversed).collect()),
        other => other.clone(),
    }
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn every_container_format_roundtrips(snapshot in snapshot_strategy()) {
        for format in ContainerFormat::DISPATCH_ORDER {
            let bytes = encode_container(&snapshot, format).unwrap();
            prop_assert_eq!(ContainerFormat::detect(&bytes), Some(format));
            prop_assert_eq!(&decode_container(&bytes).unwrap(), &snapshot);
        }
    }

    #[test]
    fn historical_layouts_decode(snapshot in snapshot_strategy()) {
        for layout in LegacyLayout::all() {
            let bytes = legacy_bytes(&snapshot, layout).unwrap();
            let decoded = decode_container_detailed(&bytes).unwrap();
            prop_assert_eq!(&decoded.value, &snapshot);
            prop_assert_eq!(decoded.stage, layout.expected_stage());
        }
    }

    #[test]
    fn hash_ignores_key_order(value in value_strategy(4)) {
        prop_assert_eq!(structural_hash(&value), structural_hash(&reversed(&value)));
    }

    #[test]
    fn hash_survives_json_text(snapshot in snapshot_strategy()) {
        let text = serde_json::to_vec(&snapshot).unwrap();
        let parsed: Value = serde_json::from_slice(&text).unwrap();
        prop_assert_eq!(structural_hash(&parsed), structural_hash(&snapshot));
    }

    #[test]
    fn diff_then_apply_reaches_target(
        source in snapshot_strategy(),
        target in snapshot_strategy(),
    ) {
        let ops = diff(&source, &target);
        let mut doc = source.clone();
        prop_assert_eq!(apply_patch(&mut doc, &ops).unwrap(), ops.len());
        prop_assert_eq!(&doc, &target);
        prop_assert_eq!(structural_hash(&doc), structural_hash(&target));
    }

    #[test]
    fn edits_sync_through_patches(
        initial in snapshot_strategy(),
        edits in edit_sequence_strategy(1, 12),
    ) {
        let mut client = initial.clone();
        let mut server = initial;
        for edit in &edits {
            let before = client.clone();
            edit.apply(&mut client);

            // Patches travel as JSON between client and server.
            let ops = diff(&before, &client);
            let wire = to_json(&ops).unwrap();
            let received: Vec<PatchOperation> = from_json(&wire).unwrap();

            prop_assert_eq!(structural_hash(&server), structural_hash(&before));
            apply_patch(&mut server, &received).unwrap();
            prop_assert_eq!(&server, &client);
        }
    }

    #[test]
    fn identical_snapshots_diff_to_nothing(snapshot in snapshot_strategy()) {
        prop_assert!(diff(&snapshot, &snapshot.clone()).is_empty());
    }
}

#[test]
fn large_database_stream_container() {
    let db = large_database(20);
    let bytes = encode_container(&db, ContainerFormat::StreamCompressed).unwrap();
    let raw = encode_container(&db, ContainerFormat::Raw).unwrap();
    assert!(bytes.len() < raw.len());
    assert_eq!(decode_container(&bytes).unwrap(), db);
}
