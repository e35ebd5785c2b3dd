//! Configuration for statestore
//!
//! Centralized per-store options with sensible defaults.

use serde::{Deserialize, Serialize};

/// What to do when an insert finds an existing record for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertPolicy {
    /// The new value supersedes the old one (delete then reinsert).
    Overwrite,

    /// First write wins; later values for the same key are discarded.
    KeepFirst,
}

/// Options for a single on-disk store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOptions {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Maximum store size in bytes (the LMDB memory-map reservation)
    pub max_store_size: usize,

    // -------------------------------------------------------------------------
    // Writer Configuration
    // -------------------------------------------------------------------------
    /// Insert policy applied when a key already exists
    pub insert_policy: InsertPolicy,

    /// Inserts per write transaction before an automatic commit
    pub commit_batch_size: u64,

    // -------------------------------------------------------------------------
    // Reader Configuration
    // -------------------------------------------------------------------------
    /// Concurrent read transactions allowed. Must match the environment's
    /// reader limit: exceeding it is a hard LMDB error, not contention.
    pub max_readers: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_store_size: 10 * 1024 * 1024 * 1024, // 10 GiB map reservation
            insert_policy: InsertPolicy::Overwrite,
            commit_batch_size: 10_000,
            max_readers: 10,
        }
    }
}

impl StoreOptions {
    /// Create a new options builder
    pub fn builder() -> StoreOptionsBuilder {
        StoreOptionsBuilder::default()
    }
}

/// Builder for StoreOptions
#[derive(Default)]
pub struct StoreOptionsBuilder {
    options: StoreOptions,
}

impl StoreOptionsBuilder {
    /// Set the maximum store size in bytes
    pub fn max_store_size(mut self, size: usize) -> Self {
        self.options.max_store_size = size;
        self
    }

    /// Set the insert policy
    pub fn insert_policy(mut self, policy: InsertPolicy) -> Self {
        self.options.insert_policy = policy;
        self
    }

    /// Set the number of inserts per write transaction
    pub fn commit_batch_size(mut self, count: u64) -> Self {
        self.options.commit_batch_size = count;
        self
    }

    /// Set the concurrent reader limit
    pub fn max_readers(mut self, count: u32) -> Self {
        self.options.max_readers = count;
        self
    }

    pub fn build(self) -> StoreOptions {
        self.options
    }
}
