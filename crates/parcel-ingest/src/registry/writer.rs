use rusqlite::Connection;

use super::{LegalStatusWriteStats, RegistryWriteStats};
use crate::classify::distress_flags;
use crate::db::legal_status_repo::{self, LegalStatusUpdate};
use crate::db::property_repo::{self, PropertyUpdate, UpsertOutcome};
use crate::db::{Database, DatabaseError};
use crate::merge::merge_latest;
use crate::parser::{InstrumentRecord, ParcelRecord, ParsedRecord};

/// Per-row write failures beyond this many are counted but not logged.
pub const MAX_LOGGED_ERRORS: u64 = 10;

/// Attributes a deed contributes: the sale, plus a provisional owner used
/// only if the parcel is new.
pub fn deed_update(record: &InstrumentRecord) -> PropertyUpdate {
    let owner = [&record.first_party, &record.cross_party]
        .into_iter()
        .find(|name| !name.is_empty())
        .cloned();
    PropertyUpdate {
        last_sale_date: record.recording_date,
        last_sale_price: record.consideration,
        fallback_owner: owner,
        ..Default::default()
    }
}

/// Legal-status change carried by a distress instrument, if any.
pub fn legal_status_update(record: &InstrumentRecord) -> Option<LegalStatusUpdate> {
    let flags = distress_flags(&record.document_type)?;
    Some(LegalStatusUpdate {
        lis_pendens_filed: flags.lis_pendens.then_some(true),
        tax_lien_filed: flags.tax_lien.then_some(true),
        foreclosure_status: flags.foreclosure_status.map(str::to_string),
        document_type: Some(record.document_type.clone()),
        recording_date: record.recording_date,
    })
}

/// Runs `f` over `items` in chunks, one transaction per chunk.
///
/// Begin and commit failures abort the whole write; row failures are left
/// to `f`.
fn in_batches<T, F>(
    db: &Database,
    items: &[T],
    batch_size: usize,
    mut f: F,
) -> Result<(), DatabaseError>
where
    F: FnMut(&Connection, &T, &str),
{
    for chunk in items.chunks(batch_size.max(1)) {
        let now = chrono::Utc::now().to_rfc3339();
        db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for item in chunk {
                f(&tx, item, &now);
            }
            tx.commit()?;
            Ok(())
        })?;
        log::debug!("Committed batch of {} rows", chunk.len());
    }
    Ok(())
}

fn note_row_error(errors: &mut u64, parcel_id: &str, err: &DatabaseError) {
    *errors += 1;
    if *errors <= MAX_LOGGED_ERRORS {
        log::warn!("Failed to write parcel {}: {}", parcel_id, err);
    } else if *errors == MAX_LOGGED_ERRORS + 1 {
        log::warn!("Further row errors in this write are counted but not logged");
    }
}

/// Upserts deed and parcel records into `properties`.
///
/// Deeds are first reduced to the latest sale per parcel and contribute that
/// sale. Parcel snapshots are applied unmerged in slice order, so each column
/// ends up with the last non-null value supplied for it. Distress and
/// ignorable instruments are not property updates and are passed over.
pub fn write_registry(
    db: &Database,
    records: &[ParsedRecord],
    county: &str,
    batch_size: usize,
) -> Result<RegistryWriteStats, DatabaseError> {
    let deeds = merge_latest(records.iter().filter_map(|r| match r {
        ParsedRecord::Instrument(i) if i.is_deed() => Some(i),
        _ => None,
    }));
    let updates: Vec<(&str, PropertyUpdate)> = deeds
        .into_iter()
        .map(|d| (d.parcel_id.as_str(), deed_update(d)))
        .chain(records.iter().filter_map(|r| match r {
            ParsedRecord::Parcel(p) => Some((p.parcel_id.as_str(), p.attributes.clone())),
            ParsedRecord::Instrument(_) => None,
        }))
        .collect();

    let mut stats = RegistryWriteStats::default();
    in_batches(db, &updates, batch_size, |conn, item, now| {
        let (parcel_id, update) = item;
        match property_repo::upsert(conn, parcel_id, county, update, now) {
            Ok(UpsertOutcome::Inserted) => stats.inserted += 1,
            Ok(UpsertOutcome::Updated) => stats.updated += 1,
            Err(e) => note_row_error(&mut stats.errors, parcel_id, &e),
        }
    })?;

    log::debug!(
        "Registry write for {}: {} inserted, {} updated, {} errors",
        county,
        stats.inserted,
        stats.updated,
        stats.errors
    );
    Ok(stats)
}

/// Applies distress instruments to `property_legal_status`.
pub fn write_legal_status(
    db: &Database,
    distress: &[InstrumentRecord],
    county: &str,
    batch_size: usize,
) -> Result<LegalStatusWriteStats, DatabaseError> {
    let mut stats = LegalStatusWriteStats::default();

    in_batches(db, distress, batch_size, |conn, record, now| {
        let Some(update) = legal_status_update(record) else {
            stats.skipped += 1;
            return;
        };
        match legal_status_repo::upsert(conn, &record.parcel_id, county, &update, now) {
            Ok(()) => stats.updated += 1,
            Err(e) => note_row_error(&mut stats.errors, &record.parcel_id, &e),
        }
    })?;

    log::debug!(
        "Legal status write for {}: {} updated, {} skipped, {} errors",
        county,
        stats.updated,
        stats.skipped,
        stats.errors
    );
    Ok(stats)
}

/// Streams parcel snapshots and distress instruments into the registry,
/// writing each kind whenever `batch_size` rows are pending.
///
/// Rows are written in the order they are pushed. Call [`BatchWriter::finish`]
/// to write the remainder and collect the totals.
pub struct BatchWriter<'a> {
    db: &'a Database,
    county: &'a str,
    batch_size: usize,
    parcels: Vec<ParsedRecord>,
    distress: Vec<InstrumentRecord>,
    registry: RegistryWriteStats,
    legal: LegalStatusWriteStats,
}

impl<'a> BatchWriter<'a> {
    pub fn new(db: &'a Database, county: &'a str, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            db,
            county,
            batch_size,
            parcels: Vec::with_capacity(batch_size),
            distress: Vec::new(),
            registry: RegistryWriteStats::default(),
            legal: LegalStatusWriteStats::default(),
        }
    }

    pub fn push_parcel(&mut self, parcel: ParcelRecord) -> Result<(), DatabaseError> {
        self.parcels.push(ParsedRecord::Parcel(parcel));
        if self.parcels.len() >= self.batch_size {
            self.flush_parcels()?;
        }
        Ok(())
    }

    pub fn push_distress(&mut self, record: InstrumentRecord) -> Result<(), DatabaseError> {
        self.distress.push(record);
        if self.distress.len() >= self.batch_size {
            self.flush_distress()?;
        }
        Ok(())
    }

    /// Writes merged deeds directly.
    pub fn write_deeds(&mut self, deeds: Vec<InstrumentRecord>) -> Result<(), DatabaseError> {
        let records: Vec<ParsedRecord> = deeds.into_iter().map(ParsedRecord::Instrument).collect();
        self.registry += write_registry(self.db, &records, self.county, self.batch_size)?;
        Ok(())
    }

    /// Rows waiting for the next write.
    pub fn pending(&self) -> usize {
        self.parcels.len() + self.distress.len()
    }

    fn flush_parcels(&mut self) -> Result<(), DatabaseError> {
        if !self.parcels.is_empty() {
            let batch = std::mem::take(&mut self.parcels);
            self.registry += write_registry(self.db, &batch, self.county, self.batch_size)?;
        }
        Ok(())
    }

    fn flush_distress(&mut self) -> Result<(), DatabaseError> {
        if !self.distress.is_empty() {
            let batch = std::mem::take(&mut self.distress);
            self.legal += write_legal_status(self.db, &batch, self.county, self.batch_size)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(RegistryWriteStats, LegalStatusWriteStats), DatabaseError> {
        self.flush_parcels()?;
        self.flush_distress()?;
        log::info!(
            "Registry write for {}: {} inserted, {} updated, {} legal status rows, {} errors",
            self.county,
            self.registry.inserted,
            self.registry.updated,
            self.legal.updated,
            self.registry.errors + self.legal.errors
        );
        Ok((self.registry, self.legal))
    }
}
