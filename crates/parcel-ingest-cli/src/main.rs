//! Operator CLI for the parcel registry import pipeline.
//!
//! Registers source files, runs import jobs to completion and reads back
//! job status and history from the registry database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use parcel_ingest::db::file_repo::FileFilter;
use parcel_ingest::jobs::{ImportFileStatus, ImportJobStatus};
use parcel_ingest::pipeline::NoopProgress;
use parcel_ingest::{
    load_config, start_import, ClassifyFilter, DataType, Database, ImportConfig,
    ImportJobController, ImportOptions, ImportProgressBroadcaster,
};

#[derive(Parser, Debug)]
#[command(name = "parcel-ingest")]
#[command(about = "Import land-records extracts into the property registry")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "PARCEL_INGEST_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Registry database, overriding the configured path
    #[arg(long, env = "PARCEL_INGEST_DATABASE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a file on disk for import
    Register {
        path: PathBuf,
        /// Source county (defaults to the configured county)
        #[arg(long)]
        county: Option<String>,
        #[arg(long, value_enum, default_value_t = SourceKind::Records)]
        data_type: SourceKind,
        /// daily or monthly; inferred from the file name when omitted
        #[arg(long)]
        subtype: Option<String>,
    },
    /// Register (if given a path) and import a file, waiting for the job
    Import {
        /// A registered file id, or a path to register first
        target: String,
        #[arg(long)]
        county: Option<String>,
        #[arg(long, value_enum, default_value_t = SourceKind::Records)]
        data_type: SourceKind,
    },
    /// Show one job
    Status { job_id: String },
    /// Show recent jobs across all files
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: u64,
    },
    /// List registered files
    Files {
        #[arg(long)]
        county: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(short, long, default_value_t = 100)]
        limit: u64,
    },
    /// Parse a single data file without touching the registry
    Parse {
        path: PathBuf,
        /// Emit ignorable instruments instead of deeds
        #[arg(long)]
        ignorable: bool,
        /// Leave distress instruments out
        #[arg(long)]
        no_distress: bool,
        /// Print the emitted records, not just the counters
        #[arg(long)]
        records: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceKind {
    Records,
    PropertyAppraiser,
}

impl From<SourceKind> for DataType {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Records => DataType::Records,
            SourceKind::PropertyAppraiser => DataType::PropertyAppraiser,
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to initialize tracing")?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_controller(config: ImportConfig, database: Option<PathBuf>) -> Result<ImportJobController> {
    let path = database
        .or_else(|| config.resolved_database_path())
        .context("Could not determine a database path; pass --database")?;
    let db = Database::open(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(ImportJobController::new(
        db,
        Arc::new(config),
        ImportProgressBroadcaster::default(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ImportConfig::default(),
    };
    init_logging(&config.log_level)?;
    info!("parcel-ingest v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Parse {
            path,
            ignorable,
            no_distress,
            records,
        } => {
            let mut options = ImportOptions::from_config(&config);
            options.filter = ClassifyFilter {
                filter_deeds: !ignorable,
                include_distress: !no_distress,
            };
            let outcome = tokio::task::spawn_blocking(move || {
                start_import(&path, &options, &NoopProgress)
            })
            .await??;
            if records {
                print_json(&outcome)?;
            } else {
                print_json(&serde_json::json!({
                    "format": outcome.format,
                    "emitted": outcome.records.len(),
                    "stats": outcome.stats,
                }))?;
            }
        }
        command => {
            let controller = open_controller(config, cli.database)?;
            run_job_command(&controller, command).await?;
        }
    }
    Ok(())
}

async fn run_job_command(controller: &ImportJobController, command: Command) -> Result<()> {
    match command {
        Command::Register {
            path,
            county,
            data_type,
            subtype,
        } => {
            let file = controller.register_file(
                &path,
                county.as_deref(),
                data_type.into(),
                subtype.as_deref(),
            )?;
            print_json(&file)?;
        }
        Command::Import {
            target,
            county,
            data_type,
        } => {
            let path = PathBuf::from(&target);
            let file_id = if path.is_file() {
                controller
                    .register_file(&path, county.as_deref(), data_type.into(), None)?
                    .file_id
            } else {
                target
            };

            let mut events = controller.subscribe();
            let printer = tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => info!(
                            phase = %event.phase,
                            processed = event.records_processed,
                            "{}",
                            event.message
                        ),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            let job = controller.run_to_completion(&file_id).await;
            printer.abort();
            let job = job?;
            print_json(&job)?;
            if job.status == ImportJobStatus::Failed {
                bail!(
                    "Import failed: {}",
                    job.error_message.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Command::Status { job_id } => print_json(&controller.job_status(&job_id)?)?,
        Command::History { limit } => print_json(&controller.job_history(limit)?)?,
        Command::Files {
            county,
            status,
            limit,
        } => {
            let status = status
                .map(|s| s.parse::<ImportFileStatus>())
                .transpose()
                .map_err(|s| anyhow::anyhow!("Unknown file status '{}'", s))?;
            let filter = FileFilter {
                county,
                status,
                limit: Some(limit),
            };
            print_json(&controller.list_files(&filter)?)?;
        }
        Command::Parse { .. } => bail!("parse does not use the registry"),
    }
    Ok(())
}
