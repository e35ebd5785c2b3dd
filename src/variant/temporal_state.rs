//! Temporal state: point-in-time lookup over versioned keys
//!
//! Each insert carries an effective time; a lookup at time T answers with
//! the version whose effective time is the greatest one at or before T.
//! Versions are never rewritten in place, so the store is append-mostly and
//! the full history stays queryable.
//!
//! ## Record layout
//! - key:   `u64 BE hash(bytes) | i64 BE effective_time`
//! - value: `u32 BE key_len | key bytes | u8 type_id | payload`
//!
//! Big-endian times make the version history contiguous and ascending under
//! the hash, so "latest at or before T" is one reverse-range walk.

use std::ops::Bound;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::codec::{
    build_extractors, read_i64, split_key_prefix, write_key_prefix, xxh3_hasher, Codec,
    FieldExtractor, FieldIndex, KeyHasher,
};
use crate::error::Result;
use crate::store::Store;
use crate::value::{FieldVal, Value};

/// Search field names exposed by temporal state stores
pub mod fields {
    pub const KEY: &str = "key";
    pub const EFFECTIVE_TIME: &str = "effectiveTime";
    pub const VALUE_TYPE: &str = "valueType";
    pub const VALUE: &str = "value";
}

/// Versioned key: arbitrary bytes plus an effective time in epoch millis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalStateKey {
    pub bytes: Bytes,
    pub effective_time: i64,
}

impl TemporalStateKey {
    pub fn new(bytes: impl Into<Bytes>, effective_time: i64) -> Self {
        Self {
            bytes: bytes.into(),
            effective_time,
        }
    }
}

/// Codec for [`TemporalStateKey`] records
#[derive(Clone)]
pub struct TemporalStateCodec {
    hasher: KeyHasher,
}

impl TemporalStateCodec {
    pub fn new() -> Self {
        Self {
            hasher: xxh3_hasher,
        }
    }

    /// Replace the key hash function. Used by tests to force collisions.
    pub fn with_hasher(hasher: KeyHasher) -> Self {
        Self { hasher }
    }

    fn sort_key(&self, bytes: &[u8], effective_time: i64) -> [u8; 16] {
        let mut out = [0u8; 16];
        BigEndian::write_u64(&mut out[..8], (self.hasher)(bytes));
        BigEndian::write_i64(&mut out[8..], effective_time);
        out
    }
}

impl Default for TemporalStateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for TemporalStateCodec {
    type Key = TemporalStateKey;

    fn encode_key(&self, key: &TemporalStateKey) -> Vec<u8> {
        self.sort_key(&key.bytes, key.effective_time).to_vec()
    }

    fn encode_value(&self, key: &TemporalStateKey, value: &Value) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + key.bytes.len() + 1 + value.payload().len());
        write_key_prefix(&mut out, &key.bytes);
        value.encode_into(&mut out);
        out
    }

    fn decode_value(&self, raw_value: &[u8]) -> Option<Value> {
        let (_, value_bytes) = split_key_prefix(raw_value)?;
        Value::decode(value_bytes)
    }

    fn embedded_key<'a>(&self, raw_value: &'a [u8]) -> Option<&'a [u8]> {
        split_key_prefix(raw_value).map(|(key, _)| key)
    }

    fn has_prefix(&self) -> bool {
        true
    }

    fn extractors(&self, field_index: &FieldIndex) -> Result<Vec<FieldExtractor>> {
        build_extractors(field_index, |name| match name {
            fields::KEY => Some(Box::new(|_: &[u8], raw_value: &[u8]| {
                match split_key_prefix(raw_value) {
                    Some((key, _)) => FieldVal::Text(String::from_utf8_lossy(key).into_owned()),
                    None => FieldVal::Null,
                }
            }) as FieldExtractor),
            fields::EFFECTIVE_TIME => Some(Box::new(|raw_key: &[u8], _: &[u8]| {
                match read_i64(raw_key, 8) {
                    Some(t) => FieldVal::Long(t),
                    None => FieldVal::Null,
                }
            })),
            fields::VALUE_TYPE => Some(Box::new(|_: &[u8], raw_value: &[u8]| {
                match split_key_prefix(raw_value).and_then(|(_, v)| Value::decode(v)) {
                    Some(value) => FieldVal::Text(value.type_name().to_string()),
                    None => FieldVal::Null,
                }
            })),
            fields::VALUE => Some(Box::new(|_: &[u8], raw_value: &[u8]| {
                match split_key_prefix(raw_value).and_then(|(_, v)| Value::decode(v)) {
                    Some(value) => FieldVal::Text(value.to_field_text()),
                    None => FieldVal::Null,
                }
            })),
            _ => None,
        })
    }
}

/// A store of versioned state records
pub type TemporalStateStore = Store<TemporalStateCodec>;

impl Store<TemporalStateCodec> {
    /// Latest version of `key` at or before `time`.
    ///
    /// Positions a reverse cursor at `hash | time` and walks backwards while
    /// still under the key's hash, skipping collision entries whose embedded
    /// key differs. The first embedded-key match is the answer; leaving the
    /// hash means no version exists at or before `time`.
    pub fn get_at(&self, key: &[u8], time: i64) -> Result<Option<Value>> {
        let codec = self.codec().clone();
        let upper = codec.sort_key(key, time);
        let hash = &upper[..8];

        self.read(|rtxn| {
            let span: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Unbounded, Bound::Included(&upper));
            for entry in self.db().rev_range(rtxn, &span)? {
                let (raw_key, raw_value) = entry?;
                if &raw_key[..8.min(raw_key.len())] != hash {
                    break;
                }
                if codec.embedded_key(raw_value) == Some(key) {
                    return Ok(codec.decode_value(raw_value));
                }
            }
            Ok(None)
        })
    }
}
