pub mod archive;
pub mod classify;
pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod jobs;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod sanitize;

pub use classify::{classify, Classification, ClassifyFilter};
pub use config::{load_config, ImportConfig, MunicipalRollConfig};
pub use db::{Database, DatabaseError};
pub use detect::{detect_format, FileFormat};
pub use error::{ArchiveError, ConfigError, IngestError, JobError, ParseError, Result};
pub use jobs::{DataType, ImportJobController, ImportProgressBroadcaster, JobHandle};
pub use merge::{merge_latest, Merger};
pub use parser::{InstrumentRecord, ParcelRecord, ParseStats, ParsedRecord};
pub use pipeline::{
    open_import, start_import, ImportOptions, ImportOutcome, ProgressEvent, ProgressReporter,
};
pub use registry::{
    write_legal_status, write_registry, BatchWriter, LegalStatusWriteStats, RegistryWriteStats,
};
