//! Import file repository — CRUD operations for the `import_files` table.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{Database, DatabaseError};
use crate::jobs::status::ImportFileStatus;

/// A registered source file awaiting (or having undergone) import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFileRow {
    pub file_id: String,
    pub filename: String,
    pub original_filename: String,
    pub county: String,
    pub data_type: String,
    pub file_subtype: Option<String>,
    pub storage_path: String,
    pub file_size_bytes: i64,
    pub status: ImportFileStatus,
    pub error_message: Option<String>,
    pub uploaded_at: String,
}

impl ImportFileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        Ok(Self {
            file_id: row.get("file_id")?,
            filename: row.get("filename")?,
            original_filename: row.get("original_filename")?,
            county: row.get("county")?,
            data_type: row.get("data_type")?,
            file_subtype: row.get("file_subtype")?,
            storage_path: row.get("storage_path")?,
            file_size_bytes: row.get("file_size_bytes")?,
            status: status.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown file status '{}'", status).into(),
                )
            })?,
            error_message: row.get("error_message")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }
}

/// Query filter parameters for file listing.
#[derive(Debug, Default, Clone)]
pub struct FileFilter {
    pub county: Option<String>,
    pub status: Option<ImportFileStatus>,
    pub limit: Option<u64>,
}

/// Inserts a new import file row.
pub fn insert(db: &Database, file: &ImportFileRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO import_files (file_id, filename, original_filename, county, data_type,
             file_subtype, storage_path, file_size_bytes, status, error_message, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                file.file_id,
                file.filename,
                file.original_filename,
                file.county,
                file.data_type,
                file.file_subtype,
                file.storage_path,
                file.file_size_bytes,
                file.status.as_str(),
                file.error_message,
                file.uploaded_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a file by its ID.
pub fn find_by_id(db: &Database, file_id: &str) -> Result<Option<ImportFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM import_files WHERE file_id = ?1")?;
        let mut rows = stmt.query_map(params![file_id], ImportFileRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists files, newest upload first.
pub fn query(db: &Database, filter: &FileFilter) -> Result<Vec<ImportFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref county) = filter.county {
            conditions.push(format!("county = ?{}", param_values.len() + 1));
            param_values.push(Box::new(county.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        param_values.push(Box::new(filter.limit.unwrap_or(100) as i64));
        let sql = format!(
            "SELECT * FROM import_files {} ORDER BY uploaded_at DESC LIMIT ?{}",
            where_clause,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), ImportFileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Updates the status (and error message) of a file.
///
/// The error message is cleared when `error_message` is `None`.
pub fn update_status(
    db: &Database,
    file_id: &str,
    status: ImportFileStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE import_files SET status = ?2, error_message = ?3 WHERE file_id = ?1",
            params![file_id, status.as_str(), error_message],
        )?;
        Ok(())
    })
}
