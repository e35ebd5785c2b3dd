//! Temporal ranged state: point-in-time lookup against versioned ranges
//!
//! Combines the ranged and temporal shapes: keys are `[start, end]` ranges
//! with an effective time, and a lookup asks which range contained a probe
//! point as of time T, answering with the latest qualifying version.
//!
//! ## Record layout
//! - key:   `i64 BE start | i64 BE end | i64 BE effective_time`
//! - value: `u8 type_id | payload`
//!
//! Keys sort by start, then end, then time. Unlike the plain ranged walk the
//! reverse cursor cannot stop at the first entry: a candidate may fail only
//! on its time component while an earlier version of the same range
//! qualifies, so non-qualifying entries are skipped rather than terminal.

use std::ops::Bound;

use byteorder::{BigEndian, ByteOrder};

use crate::codec::{build_extractors, read_i64, Codec, FieldExtractor, FieldIndex};
use crate::error::Result;
use crate::store::Store;
use crate::value::{FieldVal, Value};

/// Search field names exposed by temporal ranged state stores
pub mod fields {
    pub const KEY_START: &str = "keyStart";
    pub const KEY_END: &str = "keyEnd";
    pub const EFFECTIVE_TIME: &str = "effectiveTime";
    pub const VALUE_TYPE: &str = "valueType";
    pub const VALUE: &str = "value";
}

/// Inclusive range key with an effective time in epoch millis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalRangeKey {
    pub start: i64,
    pub end: i64,
    pub effective_time: i64,
}

impl TemporalRangeKey {
    pub fn new(start: i64, end: i64, effective_time: i64) -> Self {
        Self {
            start,
            end,
            effective_time,
        }
    }
}

/// Codec for [`TemporalRangeKey`] records
#[derive(Clone, Default)]
pub struct TemporalRangedStateCodec;

impl TemporalRangedStateCodec {
    pub fn new() -> Self {
        Self
    }
}

fn write_sort_key(out: &mut [u8], start: i64, end: i64, time: i64) {
    BigEndian::write_i64(&mut out[..8], start);
    BigEndian::write_i64(&mut out[8..16], end);
    BigEndian::write_i64(&mut out[16..24], time);
}

impl Codec for TemporalRangedStateCodec {
    type Key = TemporalRangeKey;

    fn encode_key(&self, key: &TemporalRangeKey) -> Vec<u8> {
        let mut out = vec![0u8; 24];
        write_sort_key(&mut out, key.start, key.end, key.effective_time);
        out
    }

    fn encode_value(&self, _key: &TemporalRangeKey, value: &Value) -> Vec<u8> {
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
            fields::EFFECTIVE_TIME => Some(Box::new(|raw_key: &[u8], _: &[u8]| {
                match read_i64(raw_key, 16) {
                    Some(v) => FieldVal::Long(v),
                    None => FieldVal::Null,
                }
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

/// A store of versioned ranged state records
pub type TemporalRangedStateStore = Store<TemporalRangedStateCodec>;

impl Store<TemporalRangedStateCodec> {
    /// The latest value whose range contained `point` as of `time`.
    ///
    /// Positions a reverse cursor at `(point, i64::MAX, i64::MAX)` and walks
    /// backwards skipping entries whose range misses the point or whose
    /// effective time is after `time`. The first qualifying entry is the
    /// latest version, since times sort ascending under each range.
    pub fn lookup_at(&self, point: i64, time: i64) -> Result<Option<Value>> {
        let mut upper = [0u8; 24];
        write_sort_key(&mut upper, point, i64::MAX, i64::MAX);
        let cancel = self.cancel_token().clone();

        self.read(|rtxn| {
            let span: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Unbounded, Bound::Included(&upper));
            for entry in self.db().rev_range(rtxn, &span)? {
                cancel.check()?;
                let (raw_key, raw_value) = entry?;
                let parts = (
                    read_i64(raw_key, 0),
                    read_i64(raw_key, 8),
                    read_i64(raw_key, 16),
                );
                if let (Some(start), Some(end), Some(t)) = parts {
                    if start <= point && point <= end && t <= time {
                        return Ok(self.codec().decode_value(raw_value));
                    }
                }
            }
            Ok(None)
        })
    }
}
