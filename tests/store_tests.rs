//! Tests for the plain state store
//!
//! These tests verify:
//! - Exact-match get over hashed keys
//! - Overwrite and keep-first insert policies
//! - Hash collision safety with a degenerate hasher
//! - Predicate search and field validation
//! - Merge behavior and idempotence
//! - Cancellation of long scans

use statestore::variant::state::fields;
use statestore::{
    FieldVal, InsertPolicy, StateCodec, StateKey, Store, StoreError, StoreOptions, Value,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_options() -> StoreOptions {
    StoreOptions::builder()
        .max_store_size(64 * 1024 * 1024)
        .build()
}

fn open_store(dir: &TempDir, name: &str) -> Store<StateCodec> {
    Store::open_rw(&dir.path().join(name), StateCodec::new(), test_options()).unwrap()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Every key hashes to the same bucket
fn degenerate_hash(_: &[u8]) -> u64 {
    42
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_insert_and_get_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "users");

    store
        .insert_all([(StateKey::from("user:42"), text("alice"))])
        .unwrap();

    assert_eq!(store.get(&StateKey::from("user:42")).unwrap(), Some(text("alice")));
}

#[test]
fn test_get_missing_key_returns_none() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "users");

    store
        .insert_all([(StateKey::from("user:42"), text("alice"))])
        .unwrap();

    assert_eq!(store.get(&StateKey::from("user:43")).unwrap(), None);
}

#[test]
fn test_document_value_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "docs");

    let doc = Value::Document(bytes::Bytes::from_static(&[0x01, 0x02, 0xff]));
    store
        .insert_all([(StateKey::from("doc:1"), doc.clone())])
        .unwrap();

    assert_eq!(store.get(&StateKey::from("doc:1")).unwrap(), Some(doc));
}

#[test]
fn test_count_reflects_distinct_keys() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "users");

    store
        .insert_all((0..100).map(|i| (StateKey::from(format!("user:{i}").as_str()), text("x"))))
        .unwrap();

    assert_eq!(store.count().unwrap(), 100);
}

#[test]
fn test_reader_opens_while_writer_store_is_alive() {
    let temp = TempDir::new().unwrap();
    let writer = open_store(&temp, "users");
    writer
        .insert_all([(StateKey::from("user:42"), text("active"))])
        .unwrap();

    // Same process, writer still open: the reader shares its environment
    // and sees the committed record.
    let reader = Store::open_ro(&temp.path().join("users"), StateCodec::new(), test_options())
        .unwrap();
    assert_eq!(reader.get(&StateKey::from("user:42")).unwrap(), Some(text("active")));

    // Writes landed after the reader opened are visible once committed.
    writer
        .insert_all([(StateKey::from("user:43"), text("new"))])
        .unwrap();
    assert_eq!(reader.get(&StateKey::from("user:43")).unwrap(), Some(text("new")));
}

#[test]
fn test_read_only_open_of_empty_directory_fails() {
    let temp = TempDir::new().unwrap();
    let result = Store::open_ro(
        &temp.path().join("nothing-here"),
        StateCodec::new(),
        test_options(),
    );
    assert!(result.is_err());
}

#[test]
fn test_inserts_spanning_multiple_commit_batches() {
    let temp = TempDir::new().unwrap();
    let options = StoreOptions::builder()
        .max_store_size(64 * 1024 * 1024)
        .commit_batch_size(2)
        .build();
    let store = Store::open_rw(&temp.path().join("users"), StateCodec::new(), options).unwrap();

    // Five inserts force two automatic commits plus the final one, so the
    // write transaction is reopened mid-batch.
    let written = store
        .insert_all((0..5).map(|i| (StateKey::from(format!("user:{i}").as_str()), text("x"))))
        .unwrap();

    assert_eq!(written, 5);
    assert_eq!(store.count().unwrap(), 5);
    assert_eq!(store.get(&StateKey::from("user:4")).unwrap(), Some(text("x")));
}

// =============================================================================
// Insert Policies
// =============================================================================

#[test]
fn test_overwrite_policy_replaces_value() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "users");

    store
        .insert_all([
            (StateKey::from("user:42"), text("alice")),
            (StateKey::from("user:42"), text("bob")),
        ])
        .unwrap();

    assert_eq!(store.get(&StateKey::from("user:42")).unwrap(), Some(text("bob")));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_keep_first_policy_discards_later_value() {
    let temp = TempDir::new().unwrap();
    let options = StoreOptions::builder()
        .max_store_size(64 * 1024 * 1024)
        .insert_policy(InsertPolicy::KeepFirst)
        .build();
    let store = Store::open_rw(&temp.path().join("users"), StateCodec::new(), options).unwrap();

    let written = store
        .insert_all([
            (StateKey::from("user:42"), text("alice")),
            (StateKey::from("user:42"), text("bob")),
        ])
        .unwrap();

    assert_eq!(written, 1);
    assert_eq!(store.get(&StateKey::from("user:42")).unwrap(), Some(text("alice")));
}

// =============================================================================
// Collision Safety
// =============================================================================

#[test]
fn test_hash_collision_keeps_both_records() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_rw(
        &temp.path().join("collide"),
        StateCodec::with_hasher(degenerate_hash),
        test_options(),
    )
    .unwrap();

    store
        .insert_all([
            (StateKey::from("alpha"), text("first")),
            (StateKey::from("beta"), text("second")),
        ])
        .unwrap();

    // Both keys share one sort key but each resolves to its own value.
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(store.get(&StateKey::from("alpha")).unwrap(), Some(text("first")));
    assert_eq!(store.get(&StateKey::from("beta")).unwrap(), Some(text("second")));
}

#[test]
fn test_collision_then_overwrite_targets_right_record() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_rw(
        &temp.path().join("collide"),
        StateCodec::with_hasher(degenerate_hash),
        test_options(),
    )
    .unwrap();

    store
        .insert_all([
            (StateKey::from("alpha"), text("first")),
            (StateKey::from("beta"), text("second")),
            (StateKey::from("alpha"), text("updated")),
        ])
        .unwrap();

    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(store.get(&StateKey::from("alpha")).unwrap(), Some(text("updated")));
    assert_eq!(store.get(&StateKey::from("beta")).unwrap(), Some(text("second")));
}

// =============================================================================
// Search
// =============================================================================

#[test]
fn test_search_matches_predicate() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "users");

    store
        .insert_all([
            (StateKey::from("user:1"), text("alice")),
            (StateKey::from("user:2"), text("bob")),
            (StateKey::from("user:3"), text("alice")),
        ])
        .unwrap();

    let mut index = statestore::FieldIndex::new();
    let key_pos = index.create(fields::KEY);
    let value_pos = index.create(fields::VALUE);

    let mut keys = Vec::new();
    let matched = store
        .search(
            &index,
            |row| row[value_pos] == FieldVal::Text("alice".to_string()),
            |row| keys.push(row[key_pos].as_text()),
        )
        .unwrap();

    assert_eq!(matched, 2);
    keys.sort();
    assert_eq!(keys, vec!["user:1", "user:3"]);
}

#[test]
fn test_search_value_field_covers_document_payloads() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "docs");

    store
        .insert_all([
            (
                StateKey::from("doc:1"),
                Value::Document(bytes::Bytes::from_static(b"needle")),
            ),
            (
                StateKey::from("doc:2"),
                Value::Document(bytes::Bytes::from_static(b"hay")),
            ),
        ])
        .unwrap();

    let mut index = statestore::FieldIndex::new();
    let value_pos = index.create(fields::VALUE);

    let matched = store
        .search(
            &index,
            |row| row[value_pos] == FieldVal::Text("needle".to_string()),
            |_| {},
        )
        .unwrap();

    assert_eq!(matched, 1);
}

#[test]
fn test_search_unknown_field_is_an_error() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "users");

    let mut index = statestore::FieldIndex::new();
    index.create("noSuchField");

    let result = store.search(&index, |_| true, |_| {});
    assert!(matches!(result, Err(StoreError::UnknownField(name)) if name == "noSuchField"));
}

#[test]
fn test_cancelled_search_is_interrupted() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, "users");

    store
        .insert_all([(StateKey::from("user:1"), text("alice"))])
        .unwrap();

    let mut index = statestore::FieldIndex::new();
    index.create(fields::KEY);

    store.cancel_token().cancel();
    let result = store.search(&index, |_| true, |_| {});
    assert!(matches!(result, Err(StoreError::Interrupted)));
}

// =============================================================================
// Merge
// =============================================================================

#[test]
fn test_merge_brings_source_records_across() {
    let temp = TempDir::new().unwrap();
    let source_path = temp.path().join("source");

    {
        let source = Store::open_rw(&source_path, StateCodec::new(), test_options()).unwrap();
        source
            .insert_all([
                (StateKey::from("a"), text("1")),
                (StateKey::from("b"), text("2")),
            ])
            .unwrap();
    }

    let target = open_store(&temp, "target");
    let written = target.merge(&source_path).unwrap();

    assert_eq!(written, 2);
    assert_eq!(target.get(&StateKey::from("a")).unwrap(), Some(text("1")));
    assert_eq!(target.get(&StateKey::from("b")).unwrap(), Some(text("2")));
}

#[test]
fn test_merge_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let source_path = temp.path().join("source");

    {
        let source = Store::open_rw(&source_path, StateCodec::new(), test_options()).unwrap();
        source
            .insert_all([
                (StateKey::from("a"), text("1")),
                (StateKey::from("b"), text("2")),
            ])
            .unwrap();
    }

    let target = open_store(&temp, "target");
    target.merge(&source_path).unwrap();
    target.merge(&source_path).unwrap();

    assert_eq!(target.count().unwrap(), 2);
    assert_eq!(target.get(&StateKey::from("a")).unwrap(), Some(text("1")));
}
