//! Test harness for isolated import runs.
//!
//! The `TestHarness` struct provides a complete isolated environment:
//! - Temporary directories for inputs and archive extraction
//! - A file-backed registry database with all migrations applied
//! - An `ImportJobController` wired to both

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use parcel_ingest::db::file_repo::ImportFileRow;
use parcel_ingest::{DataType, Database, ImportConfig, ImportJobController, ImportProgressBroadcaster};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    /// Extraction parent for archives.
    pub work_dir: PathBuf,
    pub db: Database,
    pub config: Arc<ImportConfig>,
    pub controller: ImportJobController,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(ImportConfig::default())
    }

    /// Uses `config` with the database and work directory redirected into
    /// the harness's temp directory.
    pub fn with_config(mut config: ImportConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("input");
        let work_dir = base.join("work");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        std::fs::create_dir_all(&work_dir).expect("Failed to create work dir");

        let db_path = base.join("data").join("registry.db");
        let db = Database::open(&db_path).expect("Failed to open test database");

        config.database_path = Some(db_path);
        config.work_directory = Some(work_dir.clone());
        let config = Arc::new(config);
        let controller = ImportJobController::new(
            db.clone(),
            Arc::clone(&config),
            ImportProgressBroadcaster::default(),
        );

        Self {
            temp_dir,
            input_dir,
            work_dir,
            db,
            config,
            controller,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a text input file to the input directory.
    pub fn write_input(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Write a zip archive holding `entries` (name, content).
    pub fn write_zip(&self, filename: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = self.input_dir.join(filename);
        let file = std::fs::File::create(&path).expect("Failed to create archive");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).expect("Failed to start entry");
            zip.write_all(content.as_bytes())
                .expect("Failed to write entry");
        }
        zip.finish().expect("Failed to finish archive");
        path
    }

    /// Writes and registers a records file.
    pub fn register_records(&self, filename: &str, content: &str) -> ImportFileRow {
        let path = self.write_input(filename, content);
        self.controller
            .register_file(&path, None, DataType::Records, None)
            .expect("Failed to register file")
    }

    /// Names left in the work directory.
    pub fn work_dir_entries(&self) -> Vec<String> {
        std::fs::read_dir(&self.work_dir)
            .expect("Failed to read work dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect()
    }
}
