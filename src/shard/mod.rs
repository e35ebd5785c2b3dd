//! Shard Module
//!
//! The shard lifecycle: build a shard from incoming records, pack it into a
//! shippable archive, land archives from other nodes, and merge them into
//! the consolidated per-map stores that serve lookups.
//!
//! ## Responsibilities
//! - Resolve map names to their defined key shape ([`MapResolver`])
//! - Build one shard per ingest unit ([`ShardWriter`]), one store per map
//! - Report bad records through a callback instead of aborting the shard
//! - Pack finished shards into checksummed archives ([`ShardArchive`])
//! - Receive, verify and merge archives ([`ShardMerger`])

pub mod archive;
pub mod paths;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::codec::Codec;
use crate::config::StoreOptions;
use crate::error::Result;
use crate::store::Store;
use crate::value::Value;
use crate::variant::{
    RangeKey, RangedStateCodec, StateCodec, StateKey, TemporalRangeKey, TemporalRangedStateCodec,
    TemporalStateCodec, TemporalStateKey,
};

pub use archive::ARCHIVE_EXTENSION;
pub use paths::StorePaths;

// =============================================================================
// Map Definitions
// =============================================================================

/// The key shape a named map holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapKind {
    State,
    TemporalState,
    RangedState,
    TemporalRangedState,
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MapKind::State => "State",
            MapKind::TemporalState => "TemporalState",
            MapKind::RangedState => "RangedState",
            MapKind::TemporalRangedState => "TemporalRangedState",
        };
        f.write_str(name)
    }
}

/// A resolved map: its name and defined key shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub name: String,
    pub kind: MapKind,
}

/// Resolves map names to definitions.
///
/// Map definitions live outside this crate (they are part of the caller's
/// configuration); the trait is the seam through which they are injected.
pub trait MapResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<MapDefinition>;
}

/// A fixed name-to-kind table, loadable from JSON
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StaticMapResolver {
    maps: HashMap<String, MapKind>,
}

impl StaticMapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, name: &str, kind: MapKind) -> Self {
        self.maps.insert(name.to_string(), kind);
        self
    }

    /// Load definitions from a JSON object of `{"map name": "Kind"}`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl MapResolver for StaticMapResolver {
    fn resolve(&self, name: &str) -> Option<MapDefinition> {
        self.maps.get(name).map(|kind| MapDefinition {
            name: name.to_string(),
            kind: *kind,
        })
    }
}

// =============================================================================
// Record Errors
// =============================================================================

/// Why a record was dropped instead of written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordErrorKind {
    /// The map name resolves to nothing
    UnknownMap,

    /// The map exists but holds a different key shape
    WrongKind { defined: MapKind, requested: MapKind },
}

/// A dropped record, reported through the shard's error handler.
///
/// Bad records are a data-quality problem for the caller to surface, not a
/// reason to abort the shard, so they flow through a callback rather than
/// the error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub map_name: String,
    pub kind: RecordErrorKind,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RecordErrorKind::UnknownMap => write!(f, "unknown map '{}'", self.map_name),
            RecordErrorKind::WrongKind { defined, requested } => write!(
                f,
                "map '{}' holds {defined} records, not {requested}",
                self.map_name
            ),
        }
    }
}

/// Callback invoked once per dropped record
pub type ErrorHandler = Box<dyn FnMut(&RecordError) + Send>;

// =============================================================================
// Per-map store handles
// =============================================================================

/// One open store of whichever shape its map defines
enum MapStore {
    State(Store<StateCodec>),
    TemporalState(Store<TemporalStateCodec>),
    RangedState(Store<RangedStateCodec>),
    TemporalRangedState(Store<TemporalRangedStateCodec>),
}

impl MapStore {
    fn open_rw(kind: MapKind, path: &Path, options: StoreOptions) -> Result<Self> {
        Ok(match kind {
            MapKind::State => MapStore::State(Store::open_rw(path, StateCodec::new(), options)?),
            MapKind::TemporalState => {
                MapStore::TemporalState(Store::open_rw(path, TemporalStateCodec::new(), options)?)
            }
            MapKind::RangedState => {
                MapStore::RangedState(Store::open_rw(path, RangedStateCodec::new(), options)?)
            }
            MapKind::TemporalRangedState => MapStore::TemporalRangedState(Store::open_rw(
                path,
                TemporalRangedStateCodec::new(),
                options,
            )?),
        })
    }
}

fn write_raw<C: Codec>(store: &Store<C>, rows: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
    store.write(|writer| {
        for (raw_key, raw_value) in rows {
            writer.insert_raw(raw_key, raw_value)?;
        }
        Ok(())
    })
}

struct MapSlot {
    store: MapStore,
    pending: Vec<(Vec<u8>, Vec<u8>)>,
}

impl MapSlot {
    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        match &self.store {
            MapStore::State(s) => write_raw(s, &self.pending)?,
            MapStore::TemporalState(s) => write_raw(s, &self.pending)?,
            MapStore::RangedState(s) => write_raw(s, &self.pending)?,
            MapStore::TemporalRangedState(s) => write_raw(s, &self.pending)?,
        }
        self.pending.clear();
        Ok(())
    }
}

// =============================================================================
// Shard Writer
// =============================================================================

/// Descriptor of a packed shard, ready to ship
#[derive(Debug, Clone)]
pub struct ShardArchive {
    pub shard_id: Uuid,
    pub path: PathBuf,
    pub checksum: u32,
}

/// Builds one shard: a working directory of per-map stores that closes into
/// a single checksummed archive.
///
/// Records are buffered per map and flushed in bounded batches. Records for
/// unknown or wrong-shape maps go to the error handler and are dropped; the
/// shard itself keeps building.
pub struct ShardWriter {
    paths: StorePaths,
    shard_id: Uuid,
    shard_dir: PathBuf,
    resolver: Box<dyn MapResolver>,
    options: StoreOptions,
    maps: HashMap<String, MapSlot>,
    on_error: ErrorHandler,
    dropped: u64,
}

impl ShardWriter {
    pub fn new(
        paths: StorePaths,
        resolver: Box<dyn MapResolver>,
        options: StoreOptions,
    ) -> Result<Self> {
        let shard_id = Uuid::new_v4();
        let shard_dir = paths.writer_dir().join(shard_id.to_string());
        fs::create_dir_all(&shard_dir)?;
        Ok(Self {
            paths,
            shard_id,
            shard_dir,
            resolver,
            options,
            maps: HashMap::new(),
            on_error: Box::new(|e| warn!(%e, "dropped record")),
            dropped: 0,
        })
    }

    /// Replace the dropped-record callback
    pub fn with_error_handler(mut self, on_error: ErrorHandler) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn shard_id(&self) -> Uuid {
        self.shard_id
    }

    /// Records dropped so far for map-resolution reasons
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn add_state(&mut self, map_name: &str, key: &StateKey, value: &Value) -> Result<()> {
        let batch = self.options.commit_batch_size as usize;
        let Some(slot) = self.slot(map_name, MapKind::State)? else {
            return Ok(());
        };
        if let MapStore::State(store) = &slot.store {
            let raw_key = store.codec().encode_key(key);
            let raw_value = store.codec().encode_value(key, value);
            slot.pending.push((raw_key, raw_value));
        }
        Self::maybe_flush(slot, batch)
    }

    pub fn add_temporal_state(
        &mut self,
        map_name: &str,
        key: &TemporalStateKey,
        value: &Value,
    ) -> Result<()> {
        let batch = self.options.commit_batch_size as usize;
        let Some(slot) = self.slot(map_name, MapKind::TemporalState)? else {
            return Ok(());
        };
        if let MapStore::TemporalState(store) = &slot.store {
            let raw_key = store.codec().encode_key(key);
            let raw_value = store.codec().encode_value(key, value);
            slot.pending.push((raw_key, raw_value));
        }
        Self::maybe_flush(slot, batch)
    }

    pub fn add_ranged_state(&mut self, map_name: &str, key: &RangeKey, value: &Value) -> Result<()> {
        let batch = self.options.commit_batch_size as usize;
        let Some(slot) = self.slot(map_name, MapKind::RangedState)? else {
            return Ok(());
        };
        if let MapStore::RangedState(store) = &slot.store {
            let raw_key = store.codec().encode_key(key);
            let raw_value = store.codec().encode_value(key, value);
            slot.pending.push((raw_key, raw_value));
        }
        Self::maybe_flush(slot, batch)
    }

    pub fn add_temporal_ranged_state(
        &mut self,
        map_name: &str,
        key: &TemporalRangeKey,
        value: &Value,
    ) -> Result<()> {
        let batch = self.options.commit_batch_size as usize;
        let Some(slot) = self.slot(map_name, MapKind::TemporalRangedState)? else {
            return Ok(());
        };
        if let MapStore::TemporalRangedState(store) = &slot.store {
            let raw_key = store.codec().encode_key(key);
            let raw_value = store.codec().encode_value(key, value);
            slot.pending.push((raw_key, raw_value));
        }
        Self::maybe_flush(slot, batch)
    }

    /// Flush everything, close every store, pack the shard into its archive
    /// and delete the working directory.
    pub fn close(mut self) -> Result<ShardArchive> {
        for slot in self.maps.values_mut() {
            slot.flush()?;
        }
        // Close every environment before packing the directory.
        self.maps.clear();

        let archive_path = self
            .paths
            .writer_dir()
            .join(format!("{}.{ARCHIVE_EXTENSION}", self.shard_id));
        let checksum = archive::pack_dir(&self.shard_dir, &archive_path)?;
        fs::remove_dir_all(&self.shard_dir)?;

        info!(
            shard = %self.shard_id,
            archive = %archive_path.display(),
            dropped = self.dropped,
            "closed shard"
        );
        Ok(ShardArchive {
            shard_id: self.shard_id,
            path: archive_path,
            checksum,
        })
    }

    fn maybe_flush(slot: &mut MapSlot, batch: usize) -> Result<()> {
        if slot.pending.len() >= batch {
            slot.flush()?;
        }
        Ok(())
    }

    /// The slot for `map_name`, opened lazily; `None` (after reporting) when
    /// the name is unknown or defined with a different shape.
    fn slot(&mut self, map_name: &str, requested: MapKind) -> Result<Option<&mut MapSlot>> {
        let def = match self.resolver.resolve(map_name) {
            Some(def) => def,
            None => {
                self.dropped += 1;
                (self.on_error)(&RecordError {
                    map_name: map_name.to_string(),
                    kind: RecordErrorKind::UnknownMap,
                });
                return Ok(None);
            }
        };
        if def.kind != requested {
            self.dropped += 1;
            (self.on_error)(&RecordError {
                map_name: map_name.to_string(),
                kind: RecordErrorKind::WrongKind {
                    defined: def.kind,
                    requested,
                },
            });
            return Ok(None);
        }

        if !self.maps.contains_key(map_name) {
            let store = MapStore::open_rw(
                def.kind,
                &self.shard_dir.join(map_name),
                self.options.clone(),
            )?;
            self.maps.insert(
                map_name.to_string(),
                MapSlot {
                    store,
                    pending: Vec::new(),
                },
            );
        }
        Ok(self.maps.get_mut(map_name))
    }
}

// =============================================================================
// Shard Merger
// =============================================================================

/// Lands shard archives and merges them into the consolidated stores.
///
/// Each archive moves `receive` → `staging` → unpacked under `merging` →
/// replayed into `shards/<map>/` through the normal insert path, then its
/// work directories are deleted. Map directories the resolver does not know
/// are logged and skipped, never fatal.
pub struct ShardMerger {
    paths: StorePaths,
    resolver: Box<dyn MapResolver>,
    options: StoreOptions,
}

impl ShardMerger {
    pub fn new(paths: StorePaths, resolver: Box<dyn MapResolver>, options: StoreOptions) -> Self {
        Self {
            paths,
            resolver,
            options,
        }
    }

    /// Verify an archive against its shipped checksum and land a copy in the
    /// receive stage. Returns the landed path.
    pub fn receive(&self, archive_path: &Path, checksum: u32) -> Result<PathBuf> {
        archive::verify_checksum(archive_path, checksum)?;

        let file_name = archive_path
            .file_name()
            .ok_or_else(|| crate::error::StoreError::Archive(format!(
                "not a file: {}",
                archive_path.display()
            )))?;
        let dest = self.paths.receive_dir().join(file_name);
        fs::copy(archive_path, &dest)?;
        // Guard against a torn copy before the archive becomes mergeable.
        archive::verify_checksum(&dest, checksum)?;
        info!(archive = %dest.display(), "received shard archive");
        Ok(dest)
    }

    /// Merge every received archive into the consolidated stores. Returns
    /// the number of records written.
    ///
    /// Archives stranded in the staging stage by an earlier failed pass are
    /// re-claimed first, so a crash between stages never loses a shard.
    pub fn merge_pending(&self) -> Result<u64> {
        let mut written = 0u64;

        for entry in fs::read_dir(self.paths.staging_dir())? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().ends_with(ARCHIVE_EXTENSION) {
                written += self.merge_archive(&entry.path())?;
            }
        }

        for entry in fs::read_dir(self.paths.receive_dir())? {
            let entry = entry?;
            let file_name = entry.file_name();
            if !file_name.to_string_lossy().ends_with(ARCHIVE_EXTENSION) {
                continue;
            }
            let staged = self.paths.staging_dir().join(&file_name);
            fs::rename(entry.path(), &staged)?;
            written += self.merge_archive(&staged)?;
        }

        Ok(written)
    }

    /// Merge one staged archive, deleting it and its work directory on
    /// success. On failure the work directory is removed but the staged
    /// archive stays put for the next pass to re-claim.
    fn merge_archive(&self, staged: &Path) -> Result<u64> {
        let work = self.paths.merging_dir().join(Uuid::new_v4().to_string());
        let result = self.merge_unpacked(staged, &work);
        if result.is_err() {
            let _ = fs::remove_dir_all(&work);
        }
        let written = result?;
        fs::remove_dir_all(&work)?;
        fs::remove_file(staged)?;
        Ok(written)
    }

    fn merge_unpacked(&self, staged: &Path, work: &Path) -> Result<u64> {
        archive::unpack(staged, work)?;

        let mut written = 0u64;
        for map_entry in fs::read_dir(work)? {
            let map_entry = map_entry?;
            if !map_entry.file_type()?.is_dir() {
                continue;
            }
            let map_name = map_entry.file_name().to_string_lossy().into_owned();
            match self.resolver.resolve(&map_name) {
                Some(def) => written += self.merge_map(&def, &map_entry.path())?,
                None => warn!(map = %map_name, "skipping unresolvable map directory"),
            }
        }
        Ok(written)
    }

    fn merge_map(&self, def: &MapDefinition, source: &Path) -> Result<u64> {
        let target = self.paths.shard_store_dir(&def.name);
        let options = self.options.clone();
        match def.kind {
            MapKind::State => Store::open_rw(&target, StateCodec::new(), options)?.merge(source),
            MapKind::TemporalState => {
                Store::open_rw(&target, TemporalStateCodec::new(), options)?.merge(source)
            }
            MapKind::RangedState => {
                Store::open_rw(&target, RangedStateCodec::new(), options)?.merge(source)
            }
            MapKind::TemporalRangedState => {
                Store::open_rw(&target, TemporalRangedStateCodec::new(), options)?.merge(source)
            }
        }
    }
}
