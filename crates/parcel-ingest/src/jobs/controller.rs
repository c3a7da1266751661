use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::archive;
use crate::config::ImportConfig;
use crate::db::file_repo::{self, FileFilter, ImportFileRow};
use crate::db::job_repo::{self, BeginOutcome, ImportJobRow, JobCounters, JobHistoryEntry};
use crate::db::Database;
use crate::error::{JobError, Result};
use crate::merge::Merger;
use crate::parser::{InstrumentRecord, ParseStats, ParsedRecord};
use crate::pipeline::runner::{open_import, ImportOptions};
use crate::registry::BatchWriter;

use super::progress::{
    ImportPhase, ImportProgressBroadcaster, JobProgressEvent, JobProgressTracker,
};
use super::status::{DataType, ImportFileStatus, ImportJobStatus};

/// Infers `daily` or `monthly` from an uploaded file's name.
pub fn infer_subtype(filename: &str) -> Option<&'static str> {
    let lower = filename.to_lowercase();
    if lower.starts_with("dly_") || lower.contains("daily") {
        Some("daily")
    } else if lower.contains("monthly") {
        Some("monthly")
    } else {
        None
    }
}

/// A job that has been started on the blocking pool.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: String,
    handle: JoinHandle<Result<JobCounters>>,
}

impl JobHandle {
    /// Waits for the job and returns its final counters.
    pub async fn wait(self) -> Result<JobCounters> {
        self.handle
            .await
            .map_err(|e| JobError::TaskFailed(e.to_string()))?
    }
}

/// Owns the import job state machine.
///
/// `pending -> running -> completed | failed` per job, with the file moving
/// `pending -> processing -> completed | failed` alongside it.
#[derive(Clone)]
pub struct ImportJobController {
    db: Database,
    config: Arc<ImportConfig>,
    broadcaster: ImportProgressBroadcaster,
}

impl ImportJobController {
    pub fn new(
        db: Database,
        config: Arc<ImportConfig>,
        broadcaster: ImportProgressBroadcaster,
    ) -> Self {
        Self {
            db,
            config,
            broadcaster,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    /// Records a file on disk as pending import.
    ///
    /// The county falls back to the configured default and the subtype is
    /// inferred from the file name when not supplied.
    pub fn register_file(
        &self,
        path: &Path,
        county: Option<&str>,
        data_type: DataType,
        subtype: Option<&str>,
    ) -> Result<ImportFileRow> {
        let metadata = std::fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| JobError::SourceMissing(path.to_path_buf()))?;
        let storage_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let original = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file_id = uuid::Uuid::new_v4().to_string();
        let row = ImportFileRow {
            filename: format!("{}_{}", file_id, original),
            file_id,
            file_subtype: subtype
                .map(str::to_string)
                .or_else(|| infer_subtype(&original).map(str::to_string)),
            original_filename: original,
            county: county.unwrap_or(&self.config.default_county).to_string(),
            data_type: data_type.as_str().to_string(),
            storage_path: storage_path.to_string_lossy().into_owned(),
            file_size_bytes: metadata.len() as i64,
            status: ImportFileStatus::Pending,
            error_message: None,
            uploaded_at: Utc::now().to_rfc3339(),
        };
        file_repo::insert(&self.db, &row)?;
        info!(
            "Registered {} ({}, {} bytes) as {}",
            row.original_filename, row.data_type, row.file_size_bytes, row.file_id
        );
        Ok(row)
    }

    /// Starts an import of a registered file.
    ///
    /// Rejects without touching any row when the file is unknown, missing on
    /// disk, or already being imported. Must be called within a tokio runtime.
    pub fn start_job(&self, file_id: &str) -> Result<JobHandle> {
        let file = file_repo::find_by_id(&self.db, file_id)?
            .ok_or_else(|| JobError::FileNotFound(file_id.to_string()))?;
        let source = PathBuf::from(&file.storage_path);
        if !source.is_file() {
            return Err(JobError::SourceMissing(source).into());
        }

        let job = ImportJobRow {
            job_id: uuid::Uuid::new_v4().to_string(),
            file_id: file.file_id.clone(),
            status: ImportJobStatus::Running,
            counters: JobCounters::default(),
            detected_format: None,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            error_message: None,
        };
        if job_repo::begin(&self.db, &job)? == BeginOutcome::AlreadyRunning {
            return Err(JobError::AlreadyRunning(file.file_id).into());
        }
        info!("Started job {} for file {}", job.job_id, file.file_id);

        let tracker = self
            .broadcaster
            .start_job(self.db.clone(), &job.job_id, &file.original_filename);
        let db = self.db.clone();
        let config = Arc::clone(&self.config);
        let handle = tokio::task::spawn_blocking(move || run_job(&db, &config, &file, &tracker));

        Ok(JobHandle {
            job_id: job.job_id,
            handle,
        })
    }

    /// Starts a job and waits for it to finish.
    pub async fn run_to_completion(&self, file_id: &str) -> Result<ImportJobRow> {
        let handle = self.start_job(file_id)?;
        let job_id = handle.job_id.clone();
        if let Err(e) = handle.wait().await {
            warn!("Job {} failed: {}", job_id, e);
        }
        self.job_status(&job_id)
    }

    pub fn job_status(&self, job_id: &str) -> Result<ImportJobRow> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()).into())
    }

    pub fn job_history(&self, limit: u64) -> Result<Vec<JobHistoryEntry>> {
        Ok(job_repo::history(&self.db, limit)?)
    }

    pub fn list_files(&self, filter: &FileFilter) -> Result<Vec<ImportFileRow>> {
        Ok(file_repo::query(&self.db, filter)?)
    }
}

/// Runs one job to a terminal state. Always leaves the job and file rows
/// out of `running`/`processing`; a failure to record success is itself
/// recorded as a failure.
fn run_job(
    db: &Database,
    config: &ImportConfig,
    file: &ImportFileRow,
    tracker: &JobProgressTracker,
) -> Result<JobCounters> {
    let job_id = tracker.job_id();
    let result = execute(db, config, file, tracker)
        .and_then(|counters| mark_completed(db, job_id, &file.file_id, &counters));

    match result {
        Ok(counters) => {
            tracker.completed(&format!(
                "Imported {}, updated {}, skipped {}, failed {}",
                counters.imported, counters.updated, counters.skipped, counters.failed
            ));
            info!("Job {} completed: {:?}", job_id, counters);
            Ok(counters)
        }
        Err(e) => {
            let message = e.to_string();
            error!("Job {} failed: {}", job_id, message);
            let counters = JobCounters {
                processed: tracker.processed(),
                ..Default::default()
            };
            if let Err(db_err) = job_repo::finish(
                db,
                job_id,
                ImportJobStatus::Failed,
                &counters,
                &Utc::now().to_rfc3339(),
                Some(&message),
            ) {
                error!("Failed to record failure of job {}: {}", job_id, db_err);
            }
            if let Err(db_err) = file_repo::update_status(
                db,
                &file.file_id,
                ImportFileStatus::Failed,
                Some(&message),
            ) {
                error!("Failed to mark file {} failed: {}", file.file_id, db_err);
            }
            tracker.failed(&message);
            Err(e)
        }
    }
}

fn mark_completed(
    db: &Database,
    job_id: &str,
    file_id: &str,
    counters: &JobCounters,
) -> Result<JobCounters> {
    job_repo::finish(
        db,
        job_id,
        ImportJobStatus::Completed,
        counters,
        &Utc::now().to_rfc3339(),
        None,
    )?;
    file_repo::update_status(db, file_id, ImportFileStatus::Completed, None)?;
    Ok(*counters)
}

/// Extraction through write. Any error here fails the whole job.
///
/// Records are streamed: parcel snapshots and distress instruments are
/// written in batches as they are parsed, while deeds are held one per
/// parcel until every file has been read.
fn execute(
    db: &Database,
    config: &ImportConfig,
    file: &ImportFileRow,
    tracker: &JobProgressTracker,
) -> Result<JobCounters> {
    let source = Path::new(&file.storage_path);
    let options = ImportOptions::from_config(config);

    // The guard removes the extraction directory when dropped, error or not.
    let extracted = if archive::is_zip(source) {
        tracker.update_phase(
            ImportPhase::Extracting,
            &format!("Extracting {}", file.original_filename),
        );
        Some(archive::extract(source, config.work_directory.as_deref())?)
    } else {
        None
    };
    let candidates: Vec<PathBuf> = match &extracted {
        Some(archive) => archive.files().to_vec(),
        None => vec![source.to_path_buf()],
    };

    let mut stats = ParseStats::default();
    let mut deeds: Merger<InstrumentRecord> = Merger::new();
    let mut writer = BatchWriter::new(db, &file.county, config.batch_size);

    for path in &candidates {
        let mut stream = open_import(path, &options, tracker)?;
        job_repo::set_detected_format(db, tracker.job_id(), stream.format().as_str())?;

        for record in stream.by_ref() {
            match record {
                ParsedRecord::Instrument(r) if r.is_distress() => writer.push_distress(r)?,
                ParsedRecord::Instrument(r) if r.is_deed() => deeds.push(r),
                ParsedRecord::Instrument(_) => {}
                ParsedRecord::Parcel(p) => writer.push_parcel(p)?,
            }
        }
        stats.accumulate(&stream.finish()?);
    }
    if let Some(archive) = extracted {
        archive.release();
    }

    tracker.update_phase(
        ImportPhase::Merging,
        &format!("Merged {} deeds into {} parcels", deeds.seen(), deeds.len()),
    );
    tracker.update_phase(
        ImportPhase::Writing,
        &format!(
            "Writing {} deeds and {} pending rows",
            deeds.len(),
            writer.pending()
        ),
    );
    writer.write_deeds(deeds.finish())?;
    let (registry, legal) = writer.finish()?;

    Ok(JobCounters {
        processed: stats.total_lines,
        imported: registry.inserted,
        updated: registry.updated + legal.updated,
        skipped: stats.skipped_records + legal.skipped,
        failed: registry.errors + legal.errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_subtype() {
        assert_eq!(infer_subtype("dly_records_20240105.exp"), Some("daily"));
        assert_eq!(infer_subtype("Records_Daily.zip"), Some("daily"));
        assert_eq!(infer_subtype("rec_monthly_2024_01.zip"), Some("monthly"));
        assert_eq!(infer_subtype("roll_2024.csv"), None);
    }
}
