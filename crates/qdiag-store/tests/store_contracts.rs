//! Contract tests for `LogStore` over any `FieldSource`
//!
//! The same guarantees must hold for the on-disk JSON document and for the
//! in-memory fake.

use qdiag_store::fakes::MemorySource;
use qdiag_store::{fields, LogKind, LogSet, LogStore, StoreError};
use serde_json::json;

fn write_log(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn load_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = LogStore::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "got {err:?}");
}

#[test]
fn load_invalid_json_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "bad.json", "{\"Q_e\": [1, 2,");
    let err = LogStore::load(&path).unwrap_err();
    assert!(matches!(err, StoreError::Malformed { .. }), "got {err:?}");
}

#[test]
fn load_non_sequence_value_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "bad.json", r#"{"Q_e": {"nested": 1}}"#);
    assert!(matches!(
        LogStore::load(&path),
        Err(StoreError::Malformed { .. })
    ));
}

#[test]
fn load_names_store_after_file_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "logi_training.json", r#"{"Q_e": [1, 0, 2]}"#);
    let store = LogStore::load(&path).unwrap();
    assert_eq!(store.name(), "logi_training");
    assert_eq!(store.path(), Some(path.as_path()));
    assert_eq!(store.sample_count(), 3);
    assert!(store.digest().is_some());
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

#[test]
fn missing_field_is_empty_and_sample_count_falls_back() {
    let store = MemorySource::new()
        .with_field(fields::Q_TIME, [0.1, 0.2, 0.3, 0.4])
        .into_store("mem");

    assert!(store.field("X").is_empty());
    assert!(store.field(fields::Q_ERROR).is_empty());
    assert_eq!(store.sample_count(), 4);
}

#[test]
fn repeated_access_does_not_reconvert() {
    let source = MemorySource::new().with_field(fields::Q_ERROR, [1.0, 2.0, 3.0]);
    let counter = source.counter();
    let store = source.into_store("mem");

    let first = store.field(fields::Q_ERROR);
    let second = store.field(fields::Q_ERROR);

    assert_eq!(first, second);
    assert_eq!(&*first, &[1.0, 2.0, 3.0]);
    assert_eq!(counter.get(), 1);
}

#[test]
fn corrupt_field_is_not_cached() {
    let source =
        MemorySource::new().with_raw(fields::DEBUG_GOAL_Q, vec![json!(1.0), json!("bad")]);
    let counter = source.counter();
    let store = source.into_store("mem");

    assert!(store.try_field(fields::DEBUG_GOAL_Q).is_err());
    assert!(store.field(fields::DEBUG_GOAL_Q).is_empty());
    assert_eq!(counter.get(), 2);
}

#[test]
fn long_multibyte_corrupt_value_is_reported_truncated() {
    let store = MemorySource::new()
        .with_raw(fields::Q_ERROR, vec![json!(1.0), json!("ą".repeat(30))])
        .into_store("mem");

    match store.try_field(fields::Q_ERROR) {
        Err(StoreError::CorruptField { field, index, found }) => {
            assert_eq!(field, fields::Q_ERROR);
            assert_eq!(index, 1);
            assert!(found.ends_with("..."), "found {found}");
            assert_eq!(found.chars().count(), 43);
        }
        other => panic!("expected CorruptField, got {other:?}"),
    }
    assert!(store.field(fields::Q_ERROR).is_empty());
}

#[test]
fn instrumentation_requires_nonzero_debug_value() {
    let zeros = MemorySource::new()
        .with_field(fields::DEBUG_TD_ERROR, [0.0; 10])
        .with_field(fields::DEBUG_GOAL_Q, [0.0; 10])
        .into_store("zeros");
    assert!(!zeros.has_instrumentation());

    let absent = MemorySource::new()
        .with_field(fields::Q_ERROR, [1.0; 10])
        .into_store("absent");
    assert!(!absent.has_instrumentation());

    let one = MemorySource::new()
        .with_field(fields::DEBUG_GOAL_Q, [0.0, 0.0, 3.5])
        .into_store("one");
    assert!(one.has_instrumentation());
}

#[test]
fn field_group_lists_present_members() {
    let store = MemorySource::new()
        .with_field(fields::PI_ERROR, [1.0])
        .with_field(fields::PI_CONTROL, [1.0])
        .with_field(fields::Q_ERROR, [1.0])
        .into_store("mem");

    let group = store.field_group(qdiag_store::FieldGroup::PiController);
    assert_eq!(group, vec![fields::PI_ERROR, fields::PI_CONTROL]);
    assert!(store
        .field_group(qdiag_store::FieldGroup::Reference)
        .is_empty());
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[test]
fn discover_loads_every_present_log() {
    let dir = tempfile::tempdir().unwrap();
    let set = LogSet::in_dir(dir.path());
    for kind in LogKind::all() {
        std::fs::write(set.path(kind), r#"{"Q_e": [1]}"#).unwrap();
    }

    let kinds: Vec<LogKind> = set.discover().into_iter().map(|(k, _)| k).collect();
    assert_eq!(kinds, LogKind::all().to_vec());
}
