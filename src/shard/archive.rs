//! Shard archives
//!
//! A completed shard ships as one `.tar.zst` file. Packing writes to a
//! temporary sibling and renames into place, so a partially written archive
//! is never observed under the final name. Integrity is a crc32 of the
//! finished archive bytes, carried alongside the file and re-verified on
//! receive.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, StoreError};

/// File extension for shard archives
pub const ARCHIVE_EXTENSION: &str = "tar.zst";

const ZSTD_LEVEL: i32 = 3;
const CHECKSUM_BUF: usize = 64 * 1024;

/// Pack `src_dir` into the archive at `dest`, returning the archive checksum.
pub fn pack_dir(src_dir: &Path, dest: &Path) -> Result<u32> {
    let tmp = dest.with_extension("tmp");

    {
        let file = BufWriter::new(File::create(&tmp)?);
        let encoder = zstd::Encoder::new(file, ZSTD_LEVEL)?;
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all(".", src_dir)?;
        let encoder = builder.into_inner()?;
        let mut file = encoder.finish()?;
        file.flush()?;
    }

    let checksum = file_checksum(&tmp)?;
    fs::rename(&tmp, dest)?;
    debug!(archive = %dest.display(), checksum, "packed shard archive");
    Ok(checksum)
}

/// Unpack the archive at `src` into `dest_dir`, creating it if needed.
pub fn unpack(src: &Path, dest_dir: &Path) -> Result<()> {
    fs::create_dir_all(dest_dir)?;
    let file = BufReader::new(File::open(src)?);
    let decoder = zstd::Decoder::new(file)?;
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest_dir)
        .map_err(|e| StoreError::Archive(format!("{}: {e}", src.display())))?;
    Ok(())
}

/// crc32 of a file's bytes, streamed
pub fn file_checksum(path: &Path) -> Result<u32> {
    let mut file = BufReader::new(File::open(path)?);
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; CHECKSUM_BUF];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Verify a file against an expected checksum
pub fn verify_checksum(path: &Path, expected: u32) -> Result<()> {
    let actual = file_checksum(path)?;
    if actual != expected {
        return Err(StoreError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
