use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Process-wide import configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub work_directory: Option<PathBuf>,
    #[serde(default = "default_county")]
    pub default_county: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub municipal_roll: MunicipalRollConfig,
}

fn default_county() -> String {
    "MiamiDade".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_progress_interval() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            work_directory: None,
            default_county: default_county(),
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            log_level: default_log_level(),
            municipal_roll: MunicipalRollConfig::default(),
        }
    }
}

impl ImportConfig {
    /// The configured database path, or `~/.parcel-ingest/data/registry.db`.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}

/// Options for the fixed-layout municipal roll extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalRollConfig {
    /// Disclaimer and header rows preceding the data.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    /// Skip parcels whose most recent sale is older than this many years.
    #[serde(default)]
    pub sale_cutoff_years: Option<u32>,
}

fn default_header_rows() -> usize {
    4
}

impl Default for MunicipalRollConfig {
    fn default() -> Self {
        Self {
            header_rows: default_header_rows(),
            sale_cutoff_years: None,
        }
    }
}
