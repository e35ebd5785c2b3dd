//! Store Module
//!
//! One on-disk store: a single LMDB environment holding one duplicate-sorted
//! database, plus the scoped write/read protocol on top of it.
//!
//! ## Responsibilities
//! - Open stores read-write (create) or read-only (no-lock)
//! - Scope write transactions: open → batch inserts → guaranteed commit
//! - Scope read transactions behind the bounded reader slots
//! - Merge another completed store's records in through the insert policy
//!
//! Variant-specific lookup algorithms live in `crate::variant`; they layer
//! on the raw access this module provides.

pub mod env;
pub mod search;
pub mod writer;

use std::path::{Path, PathBuf};

use heed::types::Bytes as RawBytes;
use heed::{Database, RoTxn};
use tracing::{debug, info};

use crate::codec::Codec;
use crate::config::StoreOptions;
use crate::error::Result;

pub use env::{CancelToken, ReaderSlots, SlotGuard, StoreEnv};
pub use writer::BatchWriter;

/// One on-disk store for a single key shape
///
/// Exactly one store lives in a directory. A writer opens it read-write and
/// is the only writer; any number of readers open it read-only without
/// taking the writer lock.
pub struct Store<C: Codec> {
    path: PathBuf,
    env: StoreEnv,
    codec: C,
    options: StoreOptions,
    cancel: CancelToken,
}

impl<C: Codec> Store<C> {
    /// Open (creating if needed) a store for writing
    pub fn open_rw(path: &Path, codec: C, options: StoreOptions) -> Result<Self> {
        Self::open(path, codec, options, false)
    }

    /// Open an existing store read-only, without the writer lock
    pub fn open_ro(path: &Path, codec: C, options: StoreOptions) -> Result<Self> {
        Self::open(path, codec, options, true)
    }

    fn open(path: &Path, codec: C, options: StoreOptions, read_only: bool) -> Result<Self> {
        let env = StoreEnv::open(path, &options, read_only)?;
        debug!(path = %path.display(), read_only, "opened store");
        Ok(Self {
            path: path.to_path_buf(),
            env,
            codec,
            options,
            cancel: CancelToken::new(),
        })
    }

    /// Replace the cancel token checked by reads, scans and merges
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn db(&self) -> Database<RawBytes, RawBytes> {
        self.env.db()
    }

    // =========================================================================
    // Write Side
    // =========================================================================

    /// Run `f` with a batch writer; the final commit happens on success and
    /// the pending transaction is aborted if `f` errors.
    pub fn write<R>(&self, f: impl FnOnce(&mut BatchWriter<'_, C>) -> Result<R>) -> Result<R> {
        let mut writer = BatchWriter::new(
            &self.env,
            &self.codec,
            self.options.insert_policy,
            self.options.commit_batch_size,
        );
        let out = f(&mut writer)?;
        writer.commit()?;
        Ok(out)
    }

    /// Insert a batch of rows in one write scope, returning how many records
    /// were written (keep-first discards are not counted).
    pub fn insert_all<I>(&self, rows: I) -> Result<u64>
    where
        I: IntoIterator<Item = (C::Key, crate::value::Value)>,
    {
        self.write(|writer| {
            let mut written = 0;
            for (key, value) in rows {
                if writer.insert(&key, &value)? {
                    written += 1;
                }
            }
            Ok(written)
        })
    }

    /// Merge another completed store's contents into this one.
    ///
    /// The source is opened read-only and every raw record is replayed
    /// through the same insert path, so policy and collision handling apply
    /// exactly as they would for fresh inserts. Cancellation is checked
    /// between records. The source directory is left in place.
    pub fn merge(&self, source_path: &Path) -> Result<u64> {
        let source = Store::open_ro(source_path, self.codec.clone(), self.options.clone())?
            .with_cancel_token(self.cancel.clone());

        let mut written = 0u64;
        self.write(|writer| {
            source.read(|rtxn| {
                for entry in source.db().iter(rtxn)? {
                    self.cancel.check()?;
                    let (raw_key, raw_value) = entry?;
                    if writer.insert_raw(raw_key, raw_value)? {
                        written += 1;
                    }
                }
                Ok(())
            })
        })?;

        info!(
            source = %source_path.display(),
            target = %self.path.display(),
            written,
            "merged store"
        );
        Ok(written)
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    /// Run `f` inside a short-lived read transaction, holding one of the
    /// bounded reader slots for its duration.
    pub fn read<R>(&self, f: impl FnOnce(&RoTxn) -> Result<R>) -> Result<R> {
        self.env.read(&self.cancel, f)
    }

    /// Number of records in the store. O(1) via store metadata.
    pub fn count(&self) -> Result<u64> {
        self.read(|rtxn| Ok(self.db().len(rtxn)?))
    }
}
