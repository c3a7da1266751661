use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::classify::ClassifyFilter;
use crate::config::{ImportConfig, MunicipalRollConfig};
use crate::detect::{self, FileFormat};
use crate::error::{ParseError, Result};
use crate::jobs::progress::ImportPhase;
use crate::parser::{ParseStats, ParseStrategy, ParsedRecord, RecordStream};
use crate::sanitize;

use super::progress::{ProgressEvent, ProgressReporter};

/// Per-call parsing options.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub filter: ClassifyFilter,
    /// Lines between progress events.
    pub progress_interval: u64,
    pub municipal_roll: MunicipalRollConfig,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from_config(&ImportConfig::default())
    }
}

impl ImportOptions {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            filter: ClassifyFilter::default(),
            progress_interval: config.progress_interval,
            municipal_roll: config.municipal_roll.clone(),
        }
    }
}

/// Everything one file produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub format: FileFormat,
    pub records: Vec<ParsedRecord>,
    pub stats: ParseStats,
}

/// Detects a data file's format and opens a lazy record stream over it.
///
/// Reports the detecting and parsing phases. Unrecognized formats and files
/// that cannot be opened are errors.
pub fn open_import<'a>(
    path: &Path,
    options: &ImportOptions,
    progress: &'a dyn ProgressReporter,
) -> Result<RecordStream<'a, BufReader<File>>> {
    let filename = sanitize::redact_path(path);

    let format = {
        let _step = info_span!("detect_format", filename = %filename).entered();
        progress.report(ProgressEvent::Phase {
            phase: ImportPhase::Detecting,
            message: format!("Detecting format of {}", filename),
        });
        detect::detect_format(path)?
    };
    debug!(format = %format, "Format detected");

    let strategy = ParseStrategy::for_format(format, &options.municipal_roll)
        .ok_or_else(|| ParseError::NoParserAvailable(path.to_path_buf()))?;

    progress.report(ProgressEvent::Phase {
        phase: ImportPhase::Parsing,
        message: format!("Parsing {} as {}", filename, format),
    });
    let file = File::open(path).map_err(|e| ParseError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(RecordStream::new(
        BufReader::new(file),
        strategy,
        options.filter,
        progress,
        options.progress_interval,
    ))
}

/// Detects, parses and classifies one data file, collecting every record.
///
/// Only records the filter admits are returned; every line is still counted
/// in `stats`. Suited to single files and previews; the job controller
/// drives [`open_import`] directly so large files are never held in memory.
pub fn start_import(
    path: &Path,
    options: &ImportOptions,
    progress: &dyn ProgressReporter,
) -> Result<ImportOutcome> {
    let filename = sanitize::redact_path(path);
    let _span = info_span!("import_file", filename = %filename).entered();

    let mut stream = open_import(path, options, progress)?;
    let format = stream.format();

    let _step = info_span!("parse", format = %format).entered();
    let records: Vec<ParsedRecord> = stream.by_ref().collect();
    let stats = stream.finish()?;

    info!(
        total = stats.total_lines,
        parsed = stats.parsed_records,
        skipped = stats.skipped_records,
        emitted = records.len(),
        "File parsed"
    );

    Ok(ImportOutcome {
        format,
        records,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::parser::official_records::tests::line;
    use crate::pipeline::progress::CollectingProgress;

    fn official_file(dir: &Path) -> std::path::PathBuf {
        let lines = [
            line(&[(3, "20230615"), (10, "WD"), (22, "\"30-1234-567-0010\""), (31, "185000.00")]),
            String::new(),
            line(&[(3, "20230701"), (10, "LP"), (22, "3012345670020")]),
            line(&[(3, "20230702"), (10, "MTG"), (22, "3012345670030")]),
            "short^line".to_string(),
        ];
        let path = dir.join("dly_records.exp");
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    #[test]
    fn test_start_import_official_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = official_file(dir.path());
        let progress = CollectingProgress::default();

        let outcome = start_import(&path, &ImportOptions::default(), &progress).unwrap();
        assert_eq!(outcome.format, FileFormat::OfficialRecords);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].parcel_id(), "3012345670010");

        let s = outcome.stats;
        assert_eq!(s.total_lines, 5);
        assert_eq!(s.blank_lines, 1);
        assert_eq!(s.skipped_records, 1);
        assert_eq!(s.parsed_records, 3);
        assert_eq!(s.skipped_records + s.parsed_records, s.total_lines - s.blank_lines);

        let phases: Vec<ImportPhase> = progress
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Phase { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![ImportPhase::Detecting, ImportPhase::Parsing]);
    }

    #[test]
    fn test_open_import_streams_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legal.csv");
        std::fs::write(&path, "Folio,LegalDescription\n0101,LOT 1\n0101,BLK 2\n").unwrap();

        let progress = CollectingProgress::default();
        let mut stream = open_import(&path, &ImportOptions::default(), &progress).unwrap();
        assert_eq!(stream.format(), FileFormat::AppraiserLegal);

        let record = stream.next().unwrap();
        let ParsedRecord::Parcel(parcel) = record else {
            panic!("expected a parcel record");
        };
        assert_eq!(parcel.attributes.legal_description.as_deref(), Some("LOT 1 BLK 2"));
        assert!(stream.next().is_none());
        assert_eq!(stream.finish().unwrap().parsed_records, 2);
    }

    #[test]
    fn test_unknown_format_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "nothing to see here").unwrap();

        let err = start_import(&path, &ImportOptions::default(), &CollectingProgress::default())
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Parse(ParseError::NoParserAvailable(_))
        ));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = start_import(
            &dir.path().join("gone.exp"),
            &ImportOptions::default(),
            &CollectingProgress::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Parse(ParseError::Open { .. })));
    }
}
