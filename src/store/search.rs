//! Predicate search
//!
//! Ad-hoc search over raw records: a full sequential scan where each record
//! is reduced to the requested fields by the codec's zero-copy extractors,
//! a caller-supplied predicate filters the rows, and matches stream to a
//! consumer. A linear scan is acceptable because stores are shard-scoped,
//! not global.

use crate::codec::{Codec, FieldIndex};
use crate::error::Result;
use crate::store::Store;
use crate::value::FieldVal;

impl<C: Codec> Store<C> {
    /// Scan every record, yielding rows (one [`FieldVal`] per field in the
    /// index) that pass `predicate` to `consumer`.
    ///
    /// Cancellation is checked between records so a long scan can be aborted
    /// without leaking the read transaction. Returns the number of rows
    /// yielded.
    pub fn search(
        &self,
        field_index: &FieldIndex,
        predicate: impl Fn(&[FieldVal]) -> bool,
        mut consumer: impl FnMut(Vec<FieldVal>),
    ) -> Result<u64> {
        let extractors = self.codec().extractors(field_index)?;
        let cancel = self.cancel_token().clone();

        self.read(|rtxn| {
            let mut matched = 0u64;
            for entry in self.db().iter(rtxn)? {
                cancel.check()?;
                let (raw_key, raw_value) = entry?;
                let row: Vec<FieldVal> = extractors
                    .iter()
                    .map(|extract| extract(raw_key, raw_value))
                    .collect();
                if predicate(&row) {
                    consumer(row);
                    matched += 1;
                }
            }
            Ok(matched)
        })
    }
}
