//! Ranged state: point lookup against integer ranges
//!
//! Keys are `[start, end]` ranges over i64; a lookup asks which range
//! contains a probe point. Range bounds are the sort key directly, so no
//! hash or embedded-key prefix is involved.
//!
//! ## Record layout
//! - key:   `i64 BE start | i64 BE end`
//! - value: `u8 type_id | payload`
//!
//! Keys sort by start then end, so the candidate for a probe point is the
//! range with the greatest start at or below the probe. Ranges are expected
//! to be non-overlapping; an overlapped range shadowed by a later start is
//! not found.

use std::ops::Bound;

use byteorder::{BigEndian, ByteOrder};

use crate::codec::{build_extractors, read_i64, Codec, FieldExtractor, FieldIndex};
use crate::error::Result;
use crate::store::Store;
use crate::value::{FieldVal, Value};

/// Search field names exposed by ranged state stores
pub mod fields {
    pub const KEY_START: &str = "keyStart";
    pub const KEY_END: &str = "keyEnd";
    pub const VALUE_TYPE: &str = "valueType";
    pub const VALUE: &str = "value";
}

/// Inclusive range key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeKey {
    pub start: i64,
    pub end: i64,
}

impl RangeKey {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, point: i64) -> bool {
        self.start <= point && point <= self.end
    }
}

/// Codec for [`RangeKey`] records
#[derive(Clone, Default)]
pub struct RangedStateCodec;

impl RangedStateCodec {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn write_range(out: &mut [u8], start: i64, end: i64) {
    BigEndian::write_i64(&mut out[..8], start);
    BigEndian::write_i64(&mut out[8..16], end);
}

impl Codec for RangedStateCodec {
    type Key = RangeKey;

    fn encode_key(&self, key: &RangeKey) -> Vec<u8> {
        let mut out = vec![0u8; 16];
        write_range(&mut out, key.start, key.end);
        out
    }

    fn encode_value(&self, _key: &RangeKey, value: &Value) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + value.payload().len());
        value.encode_into(&mut out);
        out
    }

    fn decode_value(&self, raw_value: &[u8]) -> Option<Value> {
        Value::decode(raw_value)
    }

    fn embedded_key<'a>(&self, _raw_value: &'a [u8]) -> Option<&'a [u8]> {
        None
    }

    fn has_prefix(&self) -> bool {
        false
    }

    fn extractors(&self, field_index: &FieldIndex) -> Result<Vec<FieldExtractor>> {
        build_extractors(field_index, |name| match name {
            fields::KEY_START => Some(Box::new(|raw_key: &[u8], _: &[u8]| match read_i64(raw_key, 0) {
                Some(v) => FieldVal::Long(v),
                None => FieldVal::Null,
            }) as FieldExtractor),
            fields::KEY_END => Some(Box::new(|raw_key: &[u8], _: &[u8]| match read_i64(raw_key, 8) {
                Some(v) => FieldVal::Long(v),
                None => FieldVal::Null,
            })),
            fields::VALUE_TYPE => Some(Box::new(|_: &[u8], raw_value: &[u8]| {
                match Value::decode(raw_value) {
                    Some(value) => FieldVal::Text(value.type_name().to_string()),
                    None => FieldVal::Null,
                }
            })),
            fields::VALUE => Some(Box::new(|_: &[u8], raw_value: &[u8]| {
                match Value::decode(raw_value) {
                    Some(value) => FieldVal::Text(value.to_field_text()),
                    None => FieldVal::Null,
                }
            })),
            _ => None,
        })
    }
}

/// A store of ranged state records
pub type RangedStateStore = Store<RangedStateCodec>;

impl Store<RangedStateCodec> {
    /// The value whose range contains `point`, if any.
    ///
    /// Positions a reverse cursor at `(point, i64::MAX)` so the first entry
    /// seen is the range with the greatest start at or below the point. If
    /// that range ends before the point no earlier range can contain it
    /// either, so the walk stops immediately.
    pub fn lookup(&self, point: i64) -> Result<Option<Value>> {
        let mut upper = [0u8; 16];
        write_range(&mut upper, point, i64::MAX);

        self.read(|rtxn| {
            let span: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Unbounded, Bound::Included(&upper));
            let mut iter = self.db().rev_range(rtxn, &span)?;
            // Only the nearest range needs inspecting: if it ends short of
            // the point, nothing with an earlier start can contain it.
            if let Some(entry) = iter.next() {
                let (raw_key, raw_value) = entry?;
                if let (Some(start), Some(end)) = (read_i64(raw_key, 0), read_i64(raw_key, 8)) {
                    if start <= point && point <= end {
                        return Ok(self.codec().decode_value(raw_value));
                    }
                }
            }
            Ok(None)
        })
    }
}
