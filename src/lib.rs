//! # statestore
//!
//! An embedded, append-mostly key-value storage engine on a memory-mapped
//! B-tree store, built for reference/lookup state produced during stream
//! processing:
//! - Four key shapes: plain, temporal, ranged, temporal-ranged
//! - Key-hash compression with full collision resolution
//! - Single-writer batched ingestion, lock-free concurrent readers
//! - Predicate search over raw records without full decode
//! - Shard lifecycle: build, archive, ship, merge, serve
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ShardWriter                             │
//! │            (one ingest unit, one store per map)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ close() → .tar.zst archive
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      ShardMerger                             │
//! │        receive → staging → merging → shards/<map>/           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Store<C>   │          │   Search    │
//!   │ get/lookup  │          │ (full scan) │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────────────────────────────┐
//!   │        LMDB env (DUP_SORT db)       │
//!   └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod codec;
pub mod store;
pub mod variant;
pub mod shard;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{InsertPolicy, StoreOptions};

pub use codec::{Codec, FieldIndex, KeyHasher};
pub use store::{BatchWriter, CancelToken, Store};
pub use value::{FieldVal, Value};

pub use shard::{
    MapDefinition, MapKind, MapResolver, ShardArchive, ShardMerger, ShardWriter,
    StaticMapResolver, StorePaths,
};
pub use variant::{
    RangeKey, RangedStateCodec, RangedStateStore, StateCodec, StateKey, StateStore,
    TemporalRangeKey, TemporalRangedStateCodec, TemporalRangedStateStore, TemporalStateCodec,
    TemporalStateKey, TemporalStateStore,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of statestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
