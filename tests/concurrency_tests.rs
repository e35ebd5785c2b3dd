//! Tests for bounded concurrent readers
//!
//! These tests verify:
//! - Reads within the slot limit run concurrently
//! - A read past the limit blocks until a slot frees
//! - A blocked read is interruptible through the cancel token

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use statestore::{StateCodec, StateKey, Store, StoreError, StoreOptions, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_store(temp: &TempDir, max_readers: u32) -> Arc<Store<StateCodec>> {
    let options = StoreOptions::builder()
        .max_store_size(64 * 1024 * 1024)
        .max_readers(max_readers)
        .build();
    let store =
        Store::open_rw(&temp.path().join("store"), StateCodec::new(), options).unwrap();
    store
        .insert_all([(StateKey::from("k"), Value::Text("v".to_string()))])
        .unwrap();
    Arc::new(store)
}

fn slow_read(store: &Store<StateCodec>, hold: Duration) {
    store
        .read(|_| {
            thread::sleep(hold);
            Ok(())
        })
        .unwrap();
}

// =============================================================================
// Slot Semantics
// =============================================================================

#[test]
fn test_reads_within_limit_run_concurrently() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, 2);

    let start = Instant::now();
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || slow_read(&store, Duration::from_millis(300)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Two 300ms reads overlapping, not serialized to 600ms.
    assert!(start.elapsed() < Duration::from_millis(550));
}

#[test]
fn test_read_past_limit_blocks_until_a_slot_frees() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, 1);

    let holder = {
        let store = Arc::clone(&store);
        thread::spawn(move || slow_read(&store, Duration::from_millis(300)))
    };
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    store.read(|_| Ok(())).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(200));

    holder.join().unwrap();
}

#[test]
fn test_blocked_read_is_interruptible() {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp, 1);

    let holder = {
        let store = Arc::clone(&store);
        thread::spawn(move || slow_read(&store, Duration::from_millis(800)))
    };
    thread::sleep(Duration::from_millis(50));

    let canceller = {
        let cancel = store.cancel_token().clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            cancel.cancel();
        })
    };

    // Blocked waiting for the held slot; the cancel fires well before the
    // holder releases it.
    let start = Instant::now();
    let result = store.read(|_| Ok(()));
    assert!(matches!(result, Err(StoreError::Interrupted)));
    assert!(start.elapsed() < Duration::from_millis(600));

    canceller.join().unwrap();
    holder.join().unwrap();
}
