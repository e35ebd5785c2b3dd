//! Key/value codecs
//!
//! Pure byte-layout functions mapping domain keys and values to on-disk
//! records and back. No I/O happens here; the only failure mode is a
//! malformed field name when building search extractors.
//!
//! Hashed variants (plain and temporal state) store a 64-bit hash as the
//! sort key and embed the original key at the front of the value as
//! `u32 len BE | key bytes`, so a hash collision can always be resolved by
//! comparing full key bytes rather than hashes.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, StoreError};
use crate::value::{FieldVal, Value};

/// 64-bit key hash function. Injectable so collision handling is testable.
pub type KeyHasher = fn(&[u8]) -> u64;

/// Default key hash: xxh3, zero-allocation and collision-resistant enough
/// for 64 bits of sort key.
pub fn xxh3_hasher(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}

/// Extracts one search field from a raw `(key, value)` record
pub type FieldExtractor = Box<dyn Fn(&[u8], &[u8]) -> FieldVal + Send + Sync>;

/// A codec for one key shape
///
/// Implementations are cheap to clone; `Store::merge` clones the codec to
/// open the source store.
pub trait Codec: Clone + Send + Sync + 'static {
    /// The domain key type this codec encodes
    type Key;

    /// Encode the on-disk sort key. Deterministic, fixed width.
    fn encode_key(&self, key: &Self::Key) -> Vec<u8>;

    /// Encode the stored value. Hashed variants embed the original key so
    /// collisions are detectable.
    fn encode_value(&self, key: &Self::Key, value: &Value) -> Vec<u8>;

    /// Decode the value portion of a raw record. Unknown type tags decode to
    /// `None` rather than erroring.
    fn decode_value(&self, raw_value: &[u8]) -> Option<Value>;

    /// The embedded original-key bytes of a raw value, or `None` when this
    /// variant stores no key prefix. This is the prefix-predicate hook: a
    /// candidate record matches a probe key iff its embedded bytes equal the
    /// probe's bytes.
    fn embedded_key<'a>(&self, raw_value: &'a [u8]) -> Option<&'a [u8]>;

    /// Whether the collision-detection path is needed at all. True only for
    /// hashed variants.
    fn has_prefix(&self) -> bool;

    /// Build one extractor per field in the index, each reading directly from
    /// raw record bytes without a full decode.
    ///
    /// Fails with [`StoreError::UnknownField`] for a field name this variant
    /// does not expose.
    fn extractors(&self, field_index: &FieldIndex) -> Result<Vec<FieldExtractor>>;
}

// =============================================================================
// Shared layout helpers
// =============================================================================

/// Append `u32 len BE | key bytes` (the collision-resolution prefix)
pub(crate) fn write_key_prefix(out: &mut Vec<u8>, key: &[u8]) {
    let mut len = [0u8; 4];
    BigEndian::write_u32(&mut len, key.len() as u32);
    out.extend_from_slice(&len);
    out.extend_from_slice(key);
}

/// Split a prefixed value into `(embedded key, value bytes)`.
///
/// Returns `None` for a truncated record; callers treat that the same as a
/// non-matching entry.
pub(crate) fn split_key_prefix(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    if raw.len() < 4 {
        return None;
    }
    let len = BigEndian::read_u32(&raw[..4]) as usize;
    let rest = &raw[4..];
    if rest.len() < len {
        return None;
    }
    Some((&rest[..len], &rest[len..]))
}

/// Read a big-endian i64 at `offset`, or `None` past the end
pub(crate) fn read_i64(raw: &[u8], offset: usize) -> Option<i64> {
    raw.get(offset..offset + 8).map(BigEndian::read_i64)
}

// =============================================================================
// Field Index
// =============================================================================

/// An ordered set of requested search fields
///
/// Positions are assigned in creation order and are stable for the lifetime
/// of a search; result rows have one cell per position.
#[derive(Debug, Default, Clone)]
pub struct FieldIndex {
    fields: Vec<String>,
}

impl FieldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, returning its position. Adding the same name twice
    /// returns the existing position.
    pub fn create(&mut self, name: &str) -> usize {
        if let Some(pos) = self.pos(name) {
            return pos;
        }
        self.fields.push(name.to_string());
        self.fields.len() - 1
    }

    /// Position of a field, if present
    pub fn pos(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// All fields in position order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Helper for variant codecs: map every field name through `resolve`,
/// rejecting unknown names with a named-field error.
pub(crate) fn build_extractors(
    field_index: &FieldIndex,
    resolve: impl Fn(&str) -> Option<FieldExtractor>,
) -> Result<Vec<FieldExtractor>> {
    field_index
        .fields()
        .iter()
        .map(|name| resolve(name).ok_or_else(|| StoreError::UnknownField(name.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefix_roundtrip() {
        let mut raw = Vec::new();
        write_key_prefix(&mut raw, b"user:42");
        raw.push(7); // value bytes after the prefix

        let (key, rest) = split_key_prefix(&raw).unwrap();
        assert_eq!(key, b"user:42");
        assert_eq!(rest, &[7]);
    }

    #[test]
    fn test_truncated_prefix_is_none() {
        assert_eq!(split_key_prefix(&[0, 0]), None);

        let mut raw = Vec::new();
        write_key_prefix(&mut raw, b"user:42");
        assert_eq!(split_key_prefix(&raw[..raw.len() - 1]), None);
    }

    #[test]
    fn test_field_index_positions_are_stable() {
        let mut index = FieldIndex::new();
        assert_eq!(index.create("key"), 0);
        assert_eq!(index.create("value"), 1);
        assert_eq!(index.create("key"), 0);
        assert_eq!(index.pos("value"), Some(1));
        assert_eq!(index.pos("missing"), None);
        assert_eq!(index.len(), 2);
    }
}
