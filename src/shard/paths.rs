//! Stage-directory conventions
//!
//! A shard moves through fixed stages under one root:
//!
//! - `writer`    shards under construction
//! - `receive`   verified archives landed from other nodes
//! - `staging`   archives claimed by a merge pass
//! - `merging`   unpacked archives being replayed
//! - `shards`    the consolidated per-map stores being served
//! - `snapshots` point-in-time copies handed to readers
//!
//! Stage moves are same-filesystem renames, so a shard is never visible in
//! two stages at once.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// The fixed stage layout under one storage root
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Adopt `root` as the storage root and create every stage directory.
    pub fn create(root: &Path) -> Result<Self> {
        let paths = Self {
            root: root.to_path_buf(),
        };
        for dir in [
            paths.writer_dir(),
            paths.receive_dir(),
            paths.staging_dir(),
            paths.merging_dir(),
            paths.shards_dir(),
            paths.snapshots_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(paths)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn writer_dir(&self) -> PathBuf {
        self.root.join("writer")
    }

    pub fn receive_dir(&self) -> PathBuf {
        self.root.join("receive")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn merging_dir(&self) -> PathBuf {
        self.root.join("merging")
    }

    pub fn shards_dir(&self) -> PathBuf {
        self.root.join("shards")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    /// The consolidated store directory for one map
    pub fn shard_store_dir(&self, map_name: &str) -> PathBuf {
        self.shards_dir().join(map_name)
    }
}
