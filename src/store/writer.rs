//! Batch writer
//!
//! Applies the insert/overwrite/collision policy inside bounded write
//! transactions. At most one write transaction is open at a time; every
//! `commit_batch_size` inserts it is committed and reopened so a long
//! ingest never accumulates an unbounded transaction.
//!
//! Hash collisions are not errors: they are resolved by comparing the
//! original key bytes embedded in each candidate value, counted, and
//! reported as a warning when the transaction commits. An excessive
//! collision rate means the 64-bit hash is inadequate for the key
//! cardinality.

use std::ops::Bound;

use heed::types::Bytes as RawBytes;
use heed::{Database, RwTxn};
use tracing::warn;

use crate::codec::Codec;
use crate::config::InsertPolicy;
use crate::error::Result;
use crate::store::env::StoreEnv;
use crate::value::Value;

/// Write-side handle scoped to one `Store::write` call
///
/// Obtained through [`crate::store::Store::write`]; the scope guarantees the
/// final commit on success and aborts the pending transaction on error.
pub struct BatchWriter<'s, C: Codec> {
    env: &'s StoreEnv,
    db: Database<RawBytes, RawBytes>,
    codec: &'s C,
    policy: InsertPolicy,
    batch_size: u64,
    txn: Option<RwTxn<'s>>,
    uncommitted: u64,
    collisions_since_commit: u64,
    total_collisions: u64,
    total_inserted: u64,
}

impl<'s, C: Codec> BatchWriter<'s, C> {
    pub(crate) fn new(
        env: &'s StoreEnv,
        codec: &'s C,
        policy: InsertPolicy,
        batch_size: u64,
    ) -> Self {
        Self {
            env,
            db: env.db(),
            codec,
            policy,
            batch_size,
            txn: None,
            uncommitted: 0,
            collisions_since_commit: 0,
            total_collisions: 0,
            total_inserted: 0,
        }
    }

    /// Insert a key/value pair under the store's policy.
    ///
    /// Returns `true` when a record was written (including collision inserts
    /// that keep both values) and `false` when keep-first discarded the new
    /// value.
    pub fn insert(&mut self, key: &C::Key, value: &Value) -> Result<bool> {
        let raw_key = self.codec.encode_key(key);
        let raw_value = self.codec.encode_value(key, value);
        self.insert_raw(&raw_key, &raw_value)
    }

    /// Insert an already-encoded record through the same policy path.
    /// This is how `merge` replays a source store.
    pub fn insert_raw(&mut self, raw_key: &[u8], raw_value: &[u8]) -> Result<bool> {
        let db = self.db;
        let codec = self.codec;
        let policy = self.policy;
        let mut collided = false;

        let txn = match self.txn.take() {
            Some(txn) => self.txn.insert(txn),
            None => self.txn.insert(self.env.write_txn()?),
        };
        let inserted = insert_in_txn(db, codec, policy, txn, raw_key, raw_value, &mut collided)?;

        if collided {
            self.collisions_since_commit += 1;
            self.total_collisions += 1;
        }
        if inserted {
            self.total_inserted += 1;
        }

        self.uncommitted += 1;
        if self.uncommitted >= self.batch_size {
            self.commit()?;
        }
        Ok(inserted)
    }

    /// Commit the pending transaction, if any. A fresh transaction opens
    /// lazily on the next insert.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit()?;
        }
        if self.collisions_since_commit > 0 {
            warn!(
                collisions = self.collisions_since_commit,
                total = self.total_collisions,
                "hash collisions resolved as duplicates; consider whether the \
                 hash width suits the key cardinality"
            );
            self.collisions_since_commit = 0;
        }
        self.uncommitted = 0;
        Ok(())
    }

    /// Records written so far through this writer
    pub fn inserted(&self) -> u64 {
        self.total_inserted
    }

    /// Hash collisions observed so far through this writer
    pub fn collisions(&self) -> u64 {
        self.total_collisions
    }
}

/// The insert policy, applied inside an open transaction.
///
/// 1. Key absent at this sort position: plain put.
/// 2. Key present, unhashed variant: no hash ambiguity exists, so overwrite
///    replaces the record(s) and keep-first discards the new value.
/// 3. Key present, hashed variant: scan the duplicate bucket with the
///    embedded-key predicate. A full-key match is a genuine duplicate
///    (supersede or discard per policy); no match is a hash collision and
///    the new record is kept as an additional duplicate.
fn insert_in_txn<C: Codec>(
    db: Database<RawBytes, RawBytes>,
    codec: &C,
    policy: InsertPolicy,
    txn: &mut RwTxn<'_>,
    raw_key: &[u8],
    raw_value: &[u8],
    collided: &mut bool,
) -> Result<bool> {
    if db.get(txn, raw_key)?.is_none() {
        db.put(txn, raw_key, raw_value)?;
        return Ok(true);
    }

    if !codec.has_prefix() {
        return match policy {
            InsertPolicy::Overwrite => {
                db.delete(txn, raw_key)?;
                db.put(txn, raw_key, raw_value)?;
                Ok(true)
            }
            InsertPolicy::KeepFirst => Ok(false),
        };
    }

    // Find the bucket entry whose embedded original key matches ours.
    let probe = codec.embedded_key(raw_value);
    let mut matching: Option<Vec<u8>> = None;
    {
        let bucket: (Bound<&[u8]>, Bound<&[u8]>) =
            (Bound::Included(raw_key), Bound::Included(raw_key));
        for entry in db.range(txn, &bucket)? {
            let (_, candidate) = entry?;
            if codec.embedded_key(candidate) == probe {
                matching = Some(candidate.to_vec());
                break;
            }
        }
    }

    match (policy, matching) {
        (InsertPolicy::Overwrite, Some(existing)) => {
            // Genuine duplicate key: supersede the old record.
            db.delete_one_duplicate(txn, raw_key, &existing)?;
            db.put(txn, raw_key, raw_value)?;
            Ok(true)
        }
        (InsertPolicy::KeepFirst, Some(_)) => Ok(false),
        (_, None) => {
            // Hash collision: keep both records in the bucket.
            *collided = true;
            db.put(txn, raw_key, raw_value)?;
            Ok(true)
        }
    }
}
