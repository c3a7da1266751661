//! Per-job deduplication of sales: one authoritative deed per parcel.
//!
//! Parcel snapshots are not merged here; the registry coalesces them column
//! by column as they are written.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::parser::InstrumentRecord;

/// A record that belongs to a parcel and may carry an effective date.
pub trait Dated {
    fn parcel_id(&self) -> &str;
    fn effective_date(&self) -> Option<NaiveDate>;
}

impl Dated for InstrumentRecord {
    fn parcel_id(&self) -> &str {
        &self.parcel_id
    }

    fn effective_date(&self) -> Option<NaiveDate> {
        self.recording_date
    }
}

impl<T: Dated + ?Sized> Dated for &T {
    fn parcel_id(&self) -> &str {
        (**self).parcel_id()
    }

    fn effective_date(&self) -> Option<NaiveDate> {
        (**self).effective_date()
    }
}

/// Keeps the most recent record per parcel.
///
/// Undated records rank below any dated one. On equal dates (or when both
/// are undated) the record seen later wins.
#[derive(Debug)]
pub struct Merger<T: Dated> {
    latest: BTreeMap<String, T>,
    seen: u64,
}

impl<T: Dated> Default for Merger<T> {
    fn default() -> Self {
        Self {
            latest: BTreeMap::new(),
            seen: 0,
        }
    }
}

impl<T: Dated> Merger<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: T) {
        self.seen += 1;
        // `None < Some(_)`, so undated never displaces dated.
        let older = self
            .latest
            .get(record.parcel_id())
            .is_some_and(|current| record.effective_date() < current.effective_date());
        if !older {
            self.latest.insert(record.parcel_id().to_string(), record);
        }
    }

    /// Records pushed so far, including superseded ones.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Distinct parcels retained.
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// Retained records, ordered by parcel id.
    pub fn finish(self) -> Vec<T> {
        self.latest.into_values().collect()
    }
}

impl<T: Dated> Extend<T> for Merger<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

/// Merges `records` in one pass.
pub fn merge_latest<T: Dated>(records: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut merger = Merger::new();
    merger.extend(records);
    merger.finish()
}
