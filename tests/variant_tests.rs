//! Tests for the temporal and ranged key shapes
//!
//! These tests verify:
//! - Latest-at-or-before-T temporal lookups across a version history
//! - Version retention (temporal inserts never supersede)
//! - Point containment over integer ranges, including boundaries and gaps
//! - Point-in-time containment over versioned ranges

use statestore::{
    RangeKey, RangedStateCodec, Store, StoreOptions, TemporalRangeKey, TemporalRangedStateCodec,
    TemporalStateCodec, TemporalStateKey, Value,
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

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn temporal_store(temp: &TempDir) -> Store<TemporalStateCodec> {
    let store = Store::open_rw(
        &temp.path().join("temporal"),
        TemporalStateCodec::new(),
        test_options(),
    )
    .unwrap();
    store
        .insert_all([
            (TemporalStateKey::new("host", 100), text("up")),
            (TemporalStateKey::new("host", 200), text("down")),
            (TemporalStateKey::new("host", 300), text("up again")),
        ])
        .unwrap();
    store
}

// =============================================================================
// Temporal State
// =============================================================================

#[test]
fn test_temporal_lookup_before_first_version_is_empty() {
    let temp = TempDir::new().unwrap();
    let store = temporal_store(&temp);

    assert_eq!(store.get_at(b"host", 99).unwrap(), None);
}

#[test]
fn test_temporal_lookup_at_exact_version_time() {
    let temp = TempDir::new().unwrap();
    let store = temporal_store(&temp);

    assert_eq!(store.get_at(b"host", 100).unwrap(), Some(text("up")));
    assert_eq!(store.get_at(b"host", 200).unwrap(), Some(text("down")));
}

#[test]
fn test_temporal_lookup_between_versions_takes_earlier() {
    let temp = TempDir::new().unwrap();
    let store = temporal_store(&temp);

    assert_eq!(store.get_at(b"host", 250).unwrap(), Some(text("down")));
}

#[test]
fn test_temporal_lookup_after_last_version_takes_latest() {
    let temp = TempDir::new().unwrap();
    let store = temporal_store(&temp);

    assert_eq!(store.get_at(b"host", 5_000).unwrap(), Some(text("up again")));
}

#[test]
fn test_temporal_versions_are_all_retained() {
    let temp = TempDir::new().unwrap();
    let store = temporal_store(&temp);

    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn test_temporal_lookup_ignores_other_keys() {
    let temp = TempDir::new().unwrap();
    let store = temporal_store(&temp);

    store
        .insert_all([(TemporalStateKey::new("other", 100), text("noise"))])
        .unwrap();

    assert_eq!(store.get_at(b"host", 150).unwrap(), Some(text("up")));
    assert_eq!(store.get_at(b"missing", 150).unwrap(), None);
}

// =============================================================================
// Ranged State
// =============================================================================

#[test]
fn test_range_lookup_point_containment() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_rw(
        &temp.path().join("ranges"),
        RangedStateCodec::new(),
        test_options(),
    )
    .unwrap();

    store
        .insert_all([
            (RangeKey::new(10, 20), text("low")),
            (RangeKey::new(21, 30), text("mid")),
        ])
        .unwrap();

    assert_eq!(store.lookup(15).unwrap(), Some(text("low")));
    assert_eq!(store.lookup(25).unwrap(), Some(text("mid")));
    assert_eq!(store.lookup(21).unwrap(), Some(text("mid")));
    assert_eq!(store.lookup(35).unwrap(), None);
}

#[test]
fn test_range_lookup_boundaries_are_inclusive() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_rw(
        &temp.path().join("ranges"),
        RangedStateCodec::new(),
        test_options(),
    )
    .unwrap();

    store
        .insert_all([(RangeKey::new(10, 20), text("band"))])
        .unwrap();

    assert_eq!(store.lookup(10).unwrap(), Some(text("band")));
    assert_eq!(store.lookup(20).unwrap(), Some(text("band")));
    assert_eq!(store.lookup(9).unwrap(), None);
    assert_eq!(store.lookup(21).unwrap(), None);
}

// =============================================================================
// Temporal Ranged State
// =============================================================================

#[test]
fn test_temporal_range_lookup_as_of_time() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_rw(
        &temp.path().join("temporal-ranges"),
        TemporalRangedStateCodec::new(),
        test_options(),
    )
    .unwrap();

    store
        .insert_all([
            (TemporalRangeKey::new(10, 20, 100), text("old")),
            (TemporalRangeKey::new(10, 20, 200), text("new")),
        ])
        .unwrap();

    assert_eq!(store.lookup_at(15, 150).unwrap(), Some(text("old")));
    assert_eq!(store.lookup_at(15, 250).unwrap(), Some(text("new")));
    assert_eq!(store.lookup_at(15, 50).unwrap(), None);
    assert_eq!(store.lookup_at(25, 250).unwrap(), None);
}

#[test]
fn test_temporal_range_lookup_skips_later_versions() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_rw(
        &temp.path().join("temporal-ranges"),
        TemporalRangedStateCodec::new(),
        test_options(),
    )
    .unwrap();

    store
        .insert_all([
            (TemporalRangeKey::new(10, 20, 100), text("v1")),
            (TemporalRangeKey::new(10, 20, 300), text("v3")),
            (TemporalRangeKey::new(30, 40, 100), text("other band")),
        ])
        .unwrap();

    // Version at 300 exists but is after the as-of time.
    assert_eq!(store.lookup_at(15, 200).unwrap(), Some(text("v1")));
    assert_eq!(store.lookup_at(35, 200).unwrap(), Some(text("other band")));
}
