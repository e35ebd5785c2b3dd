//! Error types for statestore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for statestore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    /// Underlying LMDB failure (other than map-full, mapped below).
    #[error("store error: {0}")]
    Store(heed::Error),

    /// The store reached its configured maximum size. Fatal on insert.
    #[error("store is at maximum capacity")]
    StoreFull,

    /// A read-only open found no store in the directory.
    #[error("no store found in {0}")]
    MissingStore(String),

    // -------------------------------------------------------------------------
    // Codec / Search Errors
    // -------------------------------------------------------------------------
    #[error("unknown search field: {0}")]
    UnknownField(String),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Shard Errors
    // -------------------------------------------------------------------------
    #[error("archive error: {0}")]
    Archive(String),

    #[error("archive checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------
    /// The operation was cancelled while waiting or scanning. Distinct from
    /// I/O failure so callers can treat it as "stop, don't alarm".
    #[error("operation interrupted")]
    Interrupted,
}

impl From<heed::Error> for StoreError {
    fn from(e: heed::Error) -> Self {
        match e {
            heed::Error::Mdb(heed::MdbError::MapFull) => StoreError::StoreFull,
            other => StoreError::Store(other),
        }
    }
}
