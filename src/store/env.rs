//! LMDB environment wrapper
//!
//! Owns the memory-mapped environment and the single duplicate-sorted
//! database inside it, plus the bounded reader-slot semaphore.
//!
//! ## Concurrency
//! - Writers open the environment normally and take the LMDB writer lock.
//! - Readers open a separate `READ_ONLY | NO_LOCK` environment, so a reader
//!   process never contends with a writer or merge and only ever sees
//!   committed data.
//! - Read transactions are bounded by [`ReaderSlots`], sized to the
//!   environment's `max_readers`. Exceeding the LMDB reader table is a hard
//!   error, so the semaphore must not be larger than the limit.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use heed::types::Bytes as RawBytes;
use heed::{Database, DatabaseFlags, Env, EnvFlags, EnvOpenOptions, RoTxn, RwTxn};
use parking_lot::{Condvar, Mutex};

use crate::config::StoreOptions;
use crate::error::{Result, StoreError};

/// Fixed database name inside every store directory
const DATA_DB_NAME: &str = "data";

/// How often a blocked reader re-checks its cancel token
const ACQUIRE_POLL: Duration = Duration::from_millis(50);

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag shared by long-running operations
///
/// Scans (search, merge) and blocked reader waits check the token between
/// records and surface [`StoreError::Interrupted`] when it fires, so callers
/// can distinguish cancellation from corruption.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Error out if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(StoreError::Interrupted)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Reader Slots
// =============================================================================

/// Counting semaphore bounding concurrent read transactions
pub struct ReaderSlots {
    free: Mutex<u32>,
    released: Condvar,
}

impl ReaderSlots {
    fn new(permits: u32) -> Self {
        Self {
            free: Mutex::new(permits),
            released: Condvar::new(),
        }
    }

    /// Take a slot, blocking while none are free. The wait is interruptible
    /// through the cancel token.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<SlotGuard<'_>> {
        let mut free = self.free.lock();
        while *free == 0 {
            cancel.check()?;
            self.released.wait_for(&mut free, ACQUIRE_POLL);
        }
        *free -= 1;
        Ok(SlotGuard { slots: self })
    }
}

/// Releases its reader slot on drop
pub struct SlotGuard<'a> {
    slots: &'a ReaderSlots,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut free = self.slots.free.lock();
        *free += 1;
        self.slots.released.notify_one();
    }
}

// =============================================================================
// Store Environment
// =============================================================================

/// One open LMDB environment with its single duplicate-sorted database
pub struct StoreEnv {
    env: Env,
    db: Database<RawBytes, RawBytes>,
    read_only: bool,
    slots: ReaderSlots,
}

impl StoreEnv {
    /// Open (or, for writers, create) the store in `path`.
    ///
    /// Open failures are fatal: a store with an unopenable directory cannot
    /// be used, so errors propagate immediately.
    ///
    /// A read-only open from a separate process uses a no-lock handle and
    /// never contends with the writer. Within one process the underlying
    /// store keeps a per-path registry of open environments, so a read-only
    /// open of a path whose writer is still alive shares the writer's
    /// environment instead; reads on it still only observe committed
    /// transactions. The sharing requires the reader to pass the same
    /// options the writer opened with.
    pub fn open(path: &Path, options: &StoreOptions, read_only: bool) -> Result<Self> {
        if !read_only {
            std::fs::create_dir_all(path)?;
        }

        let mut env_options = EnvOpenOptions::new();
        env_options
            .map_size(options.max_store_size)
            .max_dbs(1)
            .max_readers(options.max_readers);

        // Opening an environment maps raw memory, hence the unsafe blocks.
        let env = unsafe {
            if read_only {
                let mut ro_options = env_options.clone();
                ro_options.flags(EnvFlags::READ_ONLY | EnvFlags::NO_LOCK);
                match ro_options.open(path) {
                    Ok(env) => env,
                    // The writer holds this environment in-process; reuse
                    // its handle by reopening with the writer's options.
                    Err(heed::Error::BadOpenOptions { .. }) => env_options.open(path)?,
                    Err(e) => return Err(e.into()),
                }
            } else {
                env_options.open(path)?
            }
        };

        let db = if read_only {
            let rtxn = env.read_txn()?;
            let db = env
                .database_options()
                .types::<RawBytes, RawBytes>()
                .name(DATA_DB_NAME)
                .flags(DatabaseFlags::DUP_SORT)
                .open(&rtxn)?
                .ok_or_else(|| StoreError::MissingStore(path.display().to_string()))?;
            rtxn.commit()?;
            db
        } else {
            let mut wtxn = env.write_txn()?;
            let db = env
                .database_options()
                .types::<RawBytes, RawBytes>()
                .name(DATA_DB_NAME)
                .flags(DatabaseFlags::DUP_SORT)
                .create(&mut wtxn)?;
            wtxn.commit()?;
            db
        };

        Ok(Self {
            env,
            db,
            read_only,
            slots: ReaderSlots::new(options.max_readers),
        })
    }

    /// The duplicate-sorted data database
    pub fn db(&self) -> Database<RawBytes, RawBytes> {
        self.db
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Begin a write transaction. At most one exists per environment; LMDB
    /// serializes writers.
    pub fn write_txn(&self) -> Result<RwTxn<'_>> {
        Ok(self.env.write_txn()?)
    }

    /// Run `f` inside a short-lived read transaction, holding a reader slot
    /// for its duration.
    pub fn read<R>(&self, cancel: &CancelToken, f: impl FnOnce(&RoTxn) -> Result<R>) -> Result<R> {
        let _slot = self.slots.acquire(cancel)?;
        let rtxn = self.env.read_txn()?;
        f(&rtxn)
    }
}
