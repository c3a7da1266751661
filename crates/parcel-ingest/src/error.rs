use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt archive '{path}': {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to create extraction directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract '{entry}' to '{path}': {source}")]
    ExtractEntry {
        entry: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No valid data files found in archive '{0}'")]
    NoDataFiles(PathBuf),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Read failed at line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("No parser available for '{0}': unrecognized file format")]
    NoParserAvailable(PathBuf),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Import file not found: {0}")]
    FileNotFound(String),

    #[error("File not found on disk: {0}")]
    SourceMissing(PathBuf),

    #[error("File {0} is already being processed")]
    AlreadyRunning(String),

    #[error("Import job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Job task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
