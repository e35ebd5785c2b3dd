//! Plain state: exact-match lookup over unbounded-length keys
//!
//! The natural key is arbitrary bytes, so the on-disk sort key is its 64-bit
//! hash and the original key is embedded in the value for collision
//! resolution.
//!
//! ## Record layout
//! - key:   `u64 BE hash(bytes)`
//! - value: `u32 BE key_len | key bytes | u8 type_id | payload`

use std::ops::Bound;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::codec::{
    build_extractors, split_key_prefix, write_key_prefix, xxh3_hasher, Codec, FieldExtractor,
    FieldIndex, KeyHasher,
};
use crate::error::Result;
use crate::store::Store;
use crate::value::{FieldVal, Value};

/// Search field names exposed by state stores
pub mod fields {
    pub const KEY: &str = "key";
    pub const VALUE_TYPE: &str = "valueType";
    pub const VALUE: &str = "value";
}

/// Exact-match key: arbitrary bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKey {
    pub bytes: Bytes,
}

impl StateKey {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl From<&str> for StateKey {
    fn from(s: &str) -> Self {
        Self::new(Bytes::copy_from_slice(s.as_bytes()))
    }
}

/// Codec for [`StateKey`] records
#[derive(Clone)]
pub struct StateCodec {
    hasher: KeyHasher,
}

impl StateCodec {
    pub fn new() -> Self {
        Self {
            hasher: xxh3_hasher,
        }
    }

    /// Replace the key hash function. Used by tests to force collisions.
    pub fn with_hasher(hasher: KeyHasher) -> Self {
        Self { hasher }
    }

    pub(crate) fn hash(&self, bytes: &[u8]) -> [u8; 8] {
        let mut out = [0u8; 8];
        BigEndian::write_u64(&mut out, (self.hasher)(bytes));
        out
    }
}

impl Default for StateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for StateCodec {
    type Key = StateKey;

    fn encode_key(&self, key: &StateKey) -> Vec<u8> {
        self.hash(&key.bytes).to_vec()
    }

    fn encode_value(&self, key: &StateKey, value: &Value) -> Vec<u8> {
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

/// A store of plain state records
pub type StateStore = Store<StateCodec>;

impl Store<StateCodec> {
    /// Exact-match point lookup.
    ///
    /// Seeks the key's hash bucket and scans its duplicates with the
    /// embedded-key predicate until a full-key match, so a colliding entry
    /// can never answer for the wrong key.
    pub fn get(&self, key: &StateKey) -> Result<Option<Value>> {
        let raw_key = self.codec().encode_key(key);
        let probe = key.bytes.clone();
        self.read(|rtxn| {
            let bucket: (Bound<&[u8]>, Bound<&[u8]>) =
                (Bound::Included(&raw_key), Bound::Included(&raw_key));
            for entry in self.db().range(rtxn, &bucket)? {
                let (_, raw_value) = entry?;
                if self.codec().embedded_key(raw_value) == Some(probe.as_ref()) {
                    return Ok(self.codec().decode_value(raw_value));
                }
            }
            Ok(None)
        })
    }
}
