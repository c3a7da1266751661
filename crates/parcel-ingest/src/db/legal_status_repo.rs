//! Legal status repository — distress flags in `property_legal_status`.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{Database, DatabaseError};

/// Flags carried by one distress document. Unset flags are `None` and never
/// clear a stored flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegalStatusUpdate {
    pub lis_pendens_filed: Option<bool>,
    pub tax_lien_filed: Option<bool>,
    pub foreclosure_status: Option<String>,
    pub document_type: Option<String>,
    pub recording_date: Option<NaiveDate>,
}

/// A stored legal status row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalStatusRow {
    pub parcel_id: String,
    pub county: String,
    pub lis_pendens_filed: Option<bool>,
    pub tax_lien_filed: Option<bool>,
    pub foreclosure_status: Option<String>,
    pub last_document_type: Option<String>,
    pub last_recording_date: Option<String>,
    pub last_updated: String,
}

/// Inserts or merges the flags for one parcel.
pub fn upsert(
    conn: &Connection,
    parcel_id: &str,
    county: &str,
    update: &LegalStatusUpdate,
    now: &str,
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO property_legal_status (parcel_id, county, lis_pendens_filed, tax_lien_filed,
         foreclosure_status, last_document_type, last_recording_date, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(parcel_id) DO UPDATE SET
            lis_pendens_filed = COALESCE(excluded.lis_pendens_filed, lis_pendens_filed),
            tax_lien_filed = COALESCE(excluded.tax_lien_filed, tax_lien_filed),
            foreclosure_status = COALESCE(excluded.foreclosure_status, foreclosure_status),
            last_document_type = COALESCE(excluded.last_document_type, last_document_type),
            last_recording_date = COALESCE(excluded.last_recording_date, last_recording_date),
            last_updated = excluded.last_updated",
    )?;
    stmt.execute(params![
        parcel_id,
        county,
        // A flag is only ever raised here; `false` is written as "unknown".
        update.lis_pendens_filed.filter(|f| *f),
        update.tax_lien_filed.filter(|f| *f),
        update.foreclosure_status,
        update.document_type,
        update
            .recording_date
            .map(|d| d.format("%Y-%m-%d").to_string()),
        now,
    ])?;
    Ok(())
}

/// Finds the legal status of a parcel.
pub fn find(db: &Database, parcel_id: &str) -> Result<Option<LegalStatusRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM property_legal_status WHERE parcel_id = ?1",
                params![parcel_id],
                |row| {
                    Ok(LegalStatusRow {
                        parcel_id: row.get("parcel_id")?,
                        county: row.get("county")?,
                        lis_pendens_filed: row.get("lis_pendens_filed")?,
                        tax_lien_filed: row.get("tax_lien_filed")?,
                        foreclosure_status: row.get("foreclosure_status")?,
                        last_document_type: row.get("last_document_type")?,
                        last_recording_date: row.get("last_recording_date")?,
                        last_updated: row.get("last_updated")?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_accumulate_and_never_reset() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            upsert(
                conn,
                "0101",
                "MiamiDade",
                &LegalStatusUpdate {
                    lis_pendens_filed: Some(true),
                    document_type: Some("LP".to_string()),
                    recording_date: NaiveDate::from_ymd_opt(2024, 1, 5),
                    ..Default::default()
                },
                "t1",
            )?;
            upsert(
                conn,
                "0101",
                "MiamiDade",
                &LegalStatusUpdate {
                    lis_pendens_filed: Some(false),
                    tax_lien_filed: Some(true),
                    document_type: Some("TAXL".to_string()),
                    ..Default::default()
                },
                "t2",
            )
        })
        .unwrap();

        let row = find(&db, "0101").unwrap().unwrap();
        assert_eq!(row.lis_pendens_filed, Some(true));
        assert_eq!(row.tax_lien_filed, Some(true));
        assert_eq!(row.last_document_type.as_deref(), Some("TAXL"));
        assert_eq!(row.last_recording_date.as_deref(), Some("2024-01-05"));
        assert_eq!(row.last_updated, "t2");
        assert!(find(&db, "0202").unwrap().is_none());
    }
}
