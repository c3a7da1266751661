//! Job repository — CRUD operations for the `import_jobs` table.

use rusqlite::{params, ErrorCode, Row};
use serde::Serialize;

use super::{Database, DatabaseError};
use crate::jobs::status::{ImportFileStatus, ImportJobStatus};

/// Aggregate counters accumulated over every data file of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounters {
    pub processed: u64,
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// A raw job row from the database.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobRow {
    pub job_id: String,
    pub file_id: String,
    pub status: ImportJobStatus,
    pub counters: JobCounters,
    pub detected_format: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

impl ImportJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        Ok(Self {
            job_id: row.get("job_id")?,
            file_id: row.get("file_id")?,
            status: status.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown job status '{}'", status).into(),
                )
            })?,
            counters: JobCounters {
                processed: row.get::<_, i64>("records_processed")? as u64,
                imported: row.get::<_, i64>("records_imported")? as u64,
                updated: row.get::<_, i64>("records_updated")? as u64,
                skipped: row.get::<_, i64>("records_skipped")? as u64,
                failed: row.get::<_, i64>("records_failed")? as u64,
            },
            detected_format: row.get("detected_format")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            error_message: row.get("error_message")?,
        })
    }
}

/// A job joined with the identifying fields of its file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryEntry {
    #[serde(flatten)]
    pub job: ImportJobRow,
    pub original_filename: String,
    pub county: String,
    pub data_type: String,
}

/// Result of trying to open a running job for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    AlreadyRunning,
}

/// Inserts `job` as `running` and flips its file to `processing`, in one
/// transaction.
///
/// Refuses when a running job already exists for the file. The check and
/// the insert happen under the same connection lock, and the partial unique
/// index on `(file_id) WHERE status = 'running'` backs it at the data layer.
pub fn begin(db: &Database, job: &ImportJobRow) -> Result<BeginOutcome, DatabaseError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        let running: i64 = tx.query_row(
            "SELECT COUNT(*) FROM import_jobs WHERE file_id = ?1 AND status = 'running'",
            params![job.file_id],
            |r| r.get(0),
        )?;
        if running > 0 {
            return Ok(BeginOutcome::AlreadyRunning);
        }

        let inserted = tx.execute(
            "INSERT INTO import_jobs (job_id, file_id, status, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                job.job_id,
                job.file_id,
                ImportJobStatus::Running.as_str(),
                job.started_at
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Ok(BeginOutcome::AlreadyRunning);
            }
            Err(e) => return Err(e.into()),
        }

        tx.execute(
            "UPDATE import_files SET status = ?2, error_message = NULL WHERE file_id = ?1",
            params![job.file_id, ImportFileStatus::Processing.as_str()],
        )?;

        tx.commit()?;
        Ok(BeginOutcome::Started)
    })
}

/// Records the processed-records counter while a job runs.
pub fn update_progress(db: &Database, job_id: &str, processed: u64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE import_jobs SET records_processed = ?2 WHERE job_id = ?1 AND status = 'running'",
            params![job_id, processed as i64],
        )?;
        Ok(())
    })
}

/// Records which format the detector chose for the job's (last) data file.
pub fn set_detected_format(db: &Database, job_id: &str, format: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE import_jobs SET detected_format = ?2 WHERE job_id = ?1",
            params![job_id, format],
        )?;
        Ok(())
    })
}

/// Moves a running job to a terminal status with its final counters.
///
/// Returns `false` when the job was not `running`, leaving the row untouched.
pub fn finish(
    db: &Database,
    job_id: &str,
    status: ImportJobStatus,
    counters: &JobCounters,
    completed_at: &str,
    error_message: Option<&str>,
) -> Result<bool, DatabaseError> {
    if !ImportJobStatus::Running.can_transition_to(status) {
        return Err(DatabaseError::InvalidValue {
            column: "status",
            value: status.as_str().to_string(),
        });
    }
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE import_jobs SET status = ?2, records_processed = ?3, records_imported = ?4,
             records_updated = ?5, records_skipped = ?6, records_failed = ?7,
             completed_at = ?8, error_message = ?9
             WHERE job_id = ?1 AND status = 'running'",
            params![
                job_id,
                status.as_str(),
                counters.processed as i64,
                counters.imported as i64,
                counters.updated as i64,
                counters.skipped as i64,
                counters.failed as i64,
                completed_at,
                error_message,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, job_id: &str) -> Result<Option<ImportJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM import_jobs WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], ImportJobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists jobs for one file, most recent first.
pub fn for_file(db: &Database, file_id: &str) -> Result<Vec<ImportJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM import_jobs WHERE file_id = ?1 ORDER BY started_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![file_id], ImportJobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Import history across all files, most recent first.
pub fn history(db: &Database, limit: u64) -> Result<Vec<JobHistoryEntry>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT j.*, f.original_filename, f.county, f.data_type
             FROM import_jobs j
             JOIN import_files f ON j.file_id = f.file_id
             ORDER BY j.started_at DESC, j.rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(JobHistoryEntry {
                    job: ImportJobRow::from_row(row)?,
                    original_filename: row.get("original_filename")?,
                    county: row.get("county")?,
                    data_type: row.get("data_type")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::file_repo::{self, ImportFileRow};

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        file_repo::insert(
            &db,
            &ImportFileRow {
                file_id: "f1".to_string(),
                filename: "f1.exp".to_string(),
                original_filename: "dly_records.exp".to_string(),
                county: "MiamiDade".to_string(),
                data_type: "records".to_string(),
                file_subtype: None,
                storage_path: "/tmp/f1.exp".to_string(),
                file_size_bytes: 10,
                status: ImportFileStatus::Pending,
                error_message: None,
                uploaded_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        db
    }

    fn sample_job(id: &str) -> ImportJobRow {
        ImportJobRow {
            job_id: id.to_string(),
            file_id: "f1".to_string(),
            status: ImportJobStatus::Running,
            counters: JobCounters::default(),
            detected_format: None,
            started_at: format!("2026-01-01T00:00:0{}Z", id.len()),
            completed_at: None,
            error_message: None,
        }
    }

    #[test]
    fn test_begin_marks_file_processing() {
        let db = test_db();
        assert_eq!(begin(&db, &sample_job("j1")).unwrap(), BeginOutcome::Started);

        let job = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(job.status, ImportJobStatus::Running);
        let file = file_repo::find_by_id(&db, "f1").unwrap().unwrap();
        assert_eq!(file.status, ImportFileStatus::Processing);
    }

    #[test]
    fn test_begin_rejects_second_running_job() {
        let db = test_db();
        begin(&db, &sample_job("j1")).unwrap();
        assert_eq!(
            begin(&db, &sample_job("j2")).unwrap(),
            BeginOutcome::AlreadyRunning
        );
        assert!(find_by_id(&db, "j2").unwrap().is_none());
    }

    #[test]
    fn test_finish_is_one_way() {
        let db = test_db();
        begin(&db, &sample_job("j1")).unwrap();
        let counters = JobCounters {
            processed: 10,
            imported: 4,
            updated: 3,
            skipped: 2,
            failed: 1,
        };

        assert!(finish(&db, "j1", ImportJobStatus::Completed, &counters, "t", None).unwrap());
        // Already terminal: a second finish is a no-op.
        assert!(!finish(&db, "j1", ImportJobStatus::Failed, &counters, "t2", Some("x")).unwrap());

        let job = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(job.status, ImportJobStatus::Completed);
        assert_eq!(job.counters, counters);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_finish_rejects_non_terminal_target() {
        let db = test_db();
        begin(&db, &sample_job("j1")).unwrap();
        let err = finish(
            &db,
            "j1",
            ImportJobStatus::Pending,
            &JobCounters::default(),
            "t",
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_progress_only_while_running() {
        let db = test_db();
        begin(&db, &sample_job("j1")).unwrap();
        update_progress(&db, "j1", 500).unwrap();
        assert_eq!(find_by_id(&db, "j1").unwrap().unwrap().counters.processed, 500);

        finish(
            &db,
            "j1",
            ImportJobStatus::Failed,
            &JobCounters::default(),
            "t",
            Some("boom"),
        )
        .unwrap();
        update_progress(&db, "j1", 900).unwrap();
        assert_eq!(find_by_id(&db, "j1").unwrap().unwrap().counters.processed, 0);
    }

    #[test]
    fn test_history_joins_file_fields() {
        let db = test_db();
        begin(&db, &sample_job("j1")).unwrap();
        finish(
            &db,
            "j1",
            ImportJobStatus::Failed,
            &JobCounters::default(),
            "t",
            Some("boom"),
        )
        .unwrap();
        begin(&db, &sample_job("j22")).unwrap();
        set_detected_format(&db, "j22", "official_records").unwrap();

        let entries = history(&db, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].job.job_id, "j22");
        assert_eq!(entries[0].county, "MiamiDade");
        assert_eq!(
            entries[0].job.detected_format.as_deref(),
            Some("official_records")
        );
        assert_eq!(for_file(&db, "f1").unwrap().len(), 2);
    }
}
