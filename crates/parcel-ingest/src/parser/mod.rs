//! Streaming, line-oriented parsing of land-records files.
//!
//! A [`RecordStream`] pulls one line at a time from any `BufRead`, hands it to
//! the file's [`ParseStrategy`] and yields the records the classification
//! filter admits. Nothing beyond the current line is held in memory.

pub mod appraiser;
pub mod fields;
pub mod legal;
pub mod municipal_roll;
pub mod official_records;

use std::io::BufRead;

use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::{Classification, ClassifyFilter};
use crate::config::MunicipalRollConfig;
use crate::db::property_repo::PropertyUpdate;
use crate::detect::FileFormat;
use crate::error::ParseError;
use crate::pipeline::progress::{ProgressEvent, ProgressReporter};

pub use appraiser::AppraiserParser;
pub use legal::LegalDescriptionParser;
pub use municipal_roll::MunicipalRollParser;
pub use official_records::OfficialRecordsParser;

/// One recorded instrument from the recording office export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRecord {
    pub record_year: Option<i32>,
    pub record_sequence: Option<i64>,
    pub recording_date: Option<NaiveDate>,
    pub document_type: String,
    pub document_description: String,
    pub parcel_id: String,
    pub first_party: String,
    pub first_party_code: String,
    pub cross_party: String,
    pub subdivision: String,
    pub legal_description: String,
    pub case_number: String,
    pub consideration: Option<f64>,
    pub consideration_2: Option<f64>,
    pub key: String,
    pub transaction_type: String,
    pub classification: Classification,
}

impl InstrumentRecord {
    pub fn is_deed(&self) -> bool {
        self.classification == Classification::Deed
    }

    pub fn is_distress(&self) -> bool {
        self.classification == Classification::Distress
    }
}

/// A parcel snapshot from a roll or appraiser extract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelRecord {
    pub parcel_id: String,
    pub attributes: PropertyUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedRecord {
    Instrument(InstrumentRecord),
    Parcel(ParcelRecord),
}

impl ParsedRecord {
    pub fn parcel_id(&self) -> &str {
        match self {
            ParsedRecord::Instrument(r) => &r.parcel_id,
            ParsedRecord::Parcel(r) => &r.parcel_id,
        }
    }
}

/// Counters for one parse.
///
/// Every non-blank line is either skipped or parsed, so
/// `skipped_records + parsed_records == total_lines - blank_lines`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    pub total_lines: u64,
    pub blank_lines: u64,
    pub parsed_records: u64,
    pub deed_records: u64,
    pub distress_records: u64,
    /// Instruments parsed but neither deed nor distress.
    pub ignored_records: u64,
    pub skipped_records: u64,
    /// Lines that were not valid UTF-8 (decoded lossily and still parsed).
    pub errors: u64,
}

impl ParseStats {
    /// Adds another file's counters, for archives holding several files.
    pub fn accumulate(&mut self, other: &ParseStats) {
        self.total_lines += other.total_lines;
        self.blank_lines += other.blank_lines;
        self.parsed_records += other.parsed_records;
        self.deed_records += other.deed_records;
        self.distress_records += other.distress_records;
        self.ignored_records += other.ignored_records;
        self.skipped_records += other.skipped_records;
        self.errors += other.errors;
    }
}

/// Result of handing one line to a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Record(ParsedRecord),
    /// Parsed into a record still being assembled; carries a record the
    /// line completed, if any.
    Buffered(Option<ParsedRecord>),
    Skip,
}

/// The parsing strategy selected for a file.
#[derive(Debug, Clone)]
pub enum ParseStrategy {
    OfficialRecords(OfficialRecordsParser),
    MunicipalRoll(MunicipalRollParser),
    Appraiser(AppraiserParser),
    Legal(LegalDescriptionParser),
}

impl ParseStrategy {
    /// Strategy for a detected format; `None` for [`FileFormat::Unknown`].
    pub fn for_format(format: FileFormat, roll: &MunicipalRollConfig) -> Option<Self> {
        match format {
            FileFormat::OfficialRecords => {
                Some(ParseStrategy::OfficialRecords(OfficialRecordsParser::default()))
            }
            FileFormat::MunicipalRoll => Some(ParseStrategy::MunicipalRoll(
                MunicipalRollParser::new(roll, chrono::Local::now().date_naive()),
            )),
            FileFormat::AppraiserParcel => Some(ParseStrategy::Appraiser(AppraiserParser::new())),
            FileFormat::AppraiserLegal => Some(ParseStrategy::Legal(LegalDescriptionParser::new())),
            FileFormat::Unknown => None,
        }
    }

    pub fn format(&self) -> FileFormat {
        match self {
            ParseStrategy::OfficialRecords(_) => FileFormat::OfficialRecords,
            ParseStrategy::MunicipalRoll(_) => FileFormat::MunicipalRoll,
            ParseStrategy::Appraiser(_) => FileFormat::AppraiserParcel,
            ParseStrategy::Legal(_) => FileFormat::AppraiserLegal,
        }
    }

    /// `line_no` is 1-based over physical lines.
    pub fn parse_line(&mut self, line_no: u64, line: &str) -> LineOutcome {
        match self {
            ParseStrategy::OfficialRecords(p) => p.parse_line(line),
            ParseStrategy::MunicipalRoll(p) => p.parse_line(line_no, line),
            ParseStrategy::Appraiser(p) => p.parse_line(line),
            ParseStrategy::Legal(p) => p.parse_line(line),
        }
    }

    /// Record still held by a buffering strategy at end of input.
    pub fn flush(&mut self) -> Option<ParsedRecord> {
        match self {
            ParseStrategy::Legal(p) => p.flush(),
            _ => None,
        }
    }
}

/// Lazy iterator of records over a line-oriented reader.
///
/// The stream ends at end of input or at the first read error; call
/// [`RecordStream::finish`] afterwards to collect the stats or the error.
pub struct RecordStream<'a, R: BufRead> {
    reader: R,
    strategy: ParseStrategy,
    filter: ClassifyFilter,
    progress: &'a dyn ProgressReporter,
    progress_interval: u64,
    stats: ParseStats,
    buf: Vec<u8>,
    error: Option<ParseError>,
    done: bool,
}

impl<'a, R: BufRead> RecordStream<'a, R> {
    pub fn new(
        reader: R,
        strategy: ParseStrategy,
        filter: ClassifyFilter,
        progress: &'a dyn ProgressReporter,
        progress_interval: u64,
    ) -> Self {
        Self {
            reader,
            strategy,
            filter,
            progress,
            progress_interval: progress_interval.max(1),
            stats: ParseStats::default(),
            buf: Vec::new(),
            error: None,
            done: false,
        }
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn format(&self) -> FileFormat {
        self.strategy.format()
    }

    /// Final counters, or the read error that cut the stream short.
    pub fn finish(self) -> Result<ParseStats, ParseError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.stats),
        }
    }

    /// Reads the next physical line into `buf`, without its terminator.
    /// Returns `Ok(false)` at end of input.
    fn read_line(&mut self) -> std::io::Result<bool> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(false);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(true)
    }

    /// Parses the line in `buf` and updates the counters. Returns the record
    /// when the filter admits it.
    fn handle_line(&mut self) -> Option<ParsedRecord> {
        let line = match std::str::from_utf8(&self.buf) {
            Ok(s) => std::borrow::Cow::Borrowed(s),
            Err(_) => {
                self.stats.errors += 1;
                String::from_utf8_lossy(&self.buf)
            }
        };
        if line.trim().is_empty() {
            self.stats.blank_lines += 1;
            return None;
        }

        match self.strategy.parse_line(self.stats.total_lines, &line) {
            LineOutcome::Skip => {
                self.stats.skipped_records += 1;
                None
            }
            LineOutcome::Buffered(completed) => {
                self.stats.parsed_records += 1;
                completed
            }
            LineOutcome::Record(record) => {
                self.stats.parsed_records += 1;
                let class = match &record {
                    ParsedRecord::Instrument(r) => r.classification,
                    ParsedRecord::Parcel(_) => return Some(record),
                };
                match class {
                    Classification::Deed => self.stats.deed_records += 1,
                    Classification::Distress => self.stats.distress_records += 1,
                    Classification::Ignorable => self.stats.ignored_records += 1,
                }
                self.filter.admits(class).then_some(record)
            }
        }
    }

    fn report(&self, finished: bool) {
        self.progress.report(ProgressEvent::Lines {
            format: self.strategy.format(),
            stats: self.stats,
            finished,
        });
    }
}

impl<R: BufRead> Iterator for RecordStream<'_, R> {
    type Item = ParsedRecord;

    fn next(&mut self) -> Option<ParsedRecord> {
        while !self.done {
            match self.read_line() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    let last = self.strategy.flush();
                    self.report(true);
                    return last;
                }
                Err(e) => {
                    self.done = true;
                    self.error = Some(ParseError::Read {
                        line: self.stats.total_lines + 1,
                        source: e,
                    });
                    break;
                }
            }

            self.stats.total_lines += 1;
            let record = self.handle_line();
            if self.stats.total_lines % self.progress_interval == 0 {
                self.report(false);
            }
            if record.is_some() {
                return record;
            }
        }
        None
    }
}
