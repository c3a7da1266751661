//! Import progress broadcaster for real-time job status streaming.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::{job_repo, Database};
use crate::pipeline::progress::{ProgressEvent, ProgressReporter};

use super::status::ImportJobStatus;

/// Phase of an import job.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Queued,
    Extracting,
    Detecting,
    Parsing,
    Merging,
    Writing,
    Completed,
    Failed,
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportPhase::Queued => write!(f, "Queued"),
            ImportPhase::Extracting => write!(f, "Extracting archive"),
            ImportPhase::Detecting => write!(f, "Detecting format"),
            ImportPhase::Parsing => write!(f, "Parsing"),
            ImportPhase::Merging => write!(f, "Merging"),
            ImportPhase::Writing => write!(f, "Writing registry"),
            ImportPhase::Completed => write!(f, "Completed"),
            ImportPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress event for an import job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    /// Original filename being imported.
    pub filename: String,
    pub phase: ImportPhase,
    pub status: ImportJobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Lines consumed so far across every file of the job.
    pub records_processed: u64,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, filename: &str, phase: ImportPhase, message: &str) -> Self {
        let status = match phase {
            ImportPhase::Completed => ImportJobStatus::Completed,
            ImportPhase::Failed => ImportJobStatus::Failed,
            _ => ImportJobStatus::Running,
        };

        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            phase,
            status,
            message: message.to_string(),
            timestamp: Utc::now(),
            records_processed: 0,
            error: None,
        }
    }

    pub fn failed(job_id: &str, filename: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job_id, filename, ImportPhase::Failed, "Import failed")
        }
    }
}

/// Broadcasts import progress events to live subscribers.
#[derive(Clone)]
pub struct ImportProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl ImportProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one job and announces it as queued.
    pub fn start_job(&self, db: Database, job_id: &str, filename: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker {
            db,
            job_id: job_id.to_string(),
            filename: filename.to_string(),
            lines_before: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            sender: Arc::clone(&self.sender),
        };
        tracker.update_phase(ImportPhase::Queued, "Job queued for import");
        tracker
    }
}

impl Default for ImportProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single job.
///
/// As a [`ProgressReporter`] it persists `records_processed` on the job row
/// at the parser's cadence and mirrors every event to subscribers.
pub struct JobProgressTracker {
    db: Database,
    job_id: String,
    filename: String,
    /// Lines of files already finished in this job (archives hold several).
    lines_before: AtomicU64,
    processed: AtomicU64,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Lines consumed so far across the job.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn event(&self, phase: ImportPhase, message: &str) -> JobProgressEvent {
        let mut event = JobProgressEvent::new(&self.job_id, &self.filename, phase, message);
        event.records_processed = self.processed();
        event
    }

    pub fn update_phase(&self, phase: ImportPhase, message: &str) {
        let _ = self.sender.send(self.event(phase, message));
    }

    pub fn completed(&self, message: &str) {
        self.update_phase(ImportPhase::Completed, message);
    }

    pub fn failed(&self, error: &str) {
        let mut event = JobProgressEvent::failed(&self.job_id, &self.filename, error);
        event.records_processed = self.processed();
        let _ = self.sender.send(event);
    }

    fn record_lines(&self, file_lines: u64, finished: bool) {
        let base = self.lines_before.load(Ordering::Relaxed);
        let processed = base + file_lines;
        self.processed.store(processed, Ordering::Relaxed);
        if finished {
            self.lines_before.store(processed, Ordering::Relaxed);
        }

        if let Err(e) = job_repo::update_progress(&self.db, &self.job_id, processed) {
            log::warn!("Failed to persist progress for job {}: {}", self.job_id, e);
        }
        let message = format!("{} lines processed", processed);
        let _ = self.sender.send(self.event(ImportPhase::Parsing, &message));
    }
}

impl ProgressReporter for JobProgressTracker {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => self.update_phase(phase, &message),
            ProgressEvent::Lines {
                stats, finished, ..
            } => self.record_lines(stats.total_lines, finished),
        }
    }
}
