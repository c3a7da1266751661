//! Format detection from a file's leading bytes.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::ParseError;
use crate::parser::appraiser::{is_parcel_header, normalize_header};
use crate::parser::fields::split_csv;
use crate::parser::legal::is_legal_header;

/// How many leading bytes are inspected.
pub const SNIFF_LEN: usize = 1000;

/// Structural family of a land-records file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Caret-delimited recording office export.
    OfficialRecords,
    /// Fixed-column municipal roll CSV with a disclaimer preamble.
    MunicipalRoll,
    /// Header-named property appraiser CSV.
    AppraiserParcel,
    /// Appraiser legal-description extract: folio plus one line of legal text.
    AppraiserLegal,
    Unknown,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::OfficialRecords => "official_records",
            FileFormat::MunicipalRoll => "municipal_roll",
            FileFormat::AppraiserParcel => "appraiser_parcel",
            FileFormat::AppraiserLegal => "appraiser_legal",
            FileFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a file by its first [`SNIFF_LEN`] bytes.
pub fn detect_format(path: &Path) -> Result<FileFormat, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| ParseError::Read { line: 0, source: e })?;
    Ok(detect_bytes(&head))
}

/// Classifies a leading sample. Checks run in order; the first match wins.
pub fn detect_bytes(head: &[u8]) -> FileFormat {
    let sample = String::from_utf8_lossy(&head[..head.len().min(SNIFF_LEN)]);

    if sample.contains('^') {
        return FileFormat::OfficialRecords;
    }
    if sample.contains("Municipal Extract")
        || sample.contains("Roll year")
        || (sample.contains("FOLIO") && sample.contains("SALE_DATE"))
    {
        return FileFormat::MunicipalRoll;
    }
    if sample.contains(',') {
        if sample.lines().any(is_legal_header_line) {
            return FileFormat::AppraiserLegal;
        }
        let upper = sample.to_uppercase();
        if ["FOLIO", "PARCEL", "OWNER"].iter().any(|t| upper.contains(t)) {
            return FileFormat::AppraiserParcel;
        }
    }
    FileFormat::Unknown
}

/// A header row naming only a parcel column and a legal text column.
fn is_legal_header_line(line: &str) -> bool {
    let headers: Vec<String> = split_csv(line).iter().map(|h| normalize_header(h)).collect();
    headers.len() == 2
        && headers.iter().any(|h| is_parcel_header(h))
        && headers.iter().any(|h| is_legal_header(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_means_official_records() {
        assert_eq!(
            detect_bytes(b"2023^000123^R^20230615^"),
            FileFormat::OfficialRecords
        );
    }

    #[test]
    fn test_municipal_roll_signatures() {
        assert_eq!(
            detect_bytes(b"Municipal Extract - Roll year 2024\nDisclaimer"),
            FileFormat::MunicipalRoll
        );
        assert_eq!(
            detect_bytes(b"FOLIO,SITE_ADDR,SALE_DATE\n"),
            FileFormat::MunicipalRoll
        );
    }

    #[test]
    fn test_appraiser_csv_is_case_insensitive() {
        assert_eq!(
            detect_bytes(b"Folio,Owner1,SiteAddress\n"),
            FileFormat::AppraiserParcel
        );
        assert_eq!(detect_bytes(b"parcel_id,owner\n"), FileFormat::AppraiserParcel);
    }

    #[test]
    fn test_legal_extract_signature() {
        assert_eq!(
            detect_bytes(b"Folio,LegalDescription\n0101,LOT 1\n"),
            FileFormat::AppraiserLegal
        );
        assert_eq!(
            detect_bytes(b"FOLIO,OWNER1,LEGAL\n0101,SMITH,LOT 1\n"),
            FileFormat::AppraiserParcel
        );
    }

    #[test]
    fn test_unknown_inputs() {
        assert_eq!(detect_bytes(b""), FileFormat::Unknown);
        assert_eq!(detect_bytes(b"a,b,c\n1,2,3\n"), FileFormat::Unknown);
        assert_eq!(detect_bytes(b"FOLIO OWNER"), FileFormat::Unknown);
    }

    #[test]
    fn test_only_leading_bytes_count() {
        let mut data = vec![b'x'; SNIFF_LEN];
        data.extend_from_slice(b"^");
        assert_eq!(detect_bytes(&data), FileFormat::Unknown);
    }

    #[test]
    fn test_detect_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.exp");
        std::fs::write(&path, "2023^1^^20230101").unwrap();
        assert_eq!(detect_format(&path).unwrap(), FileFormat::OfficialRecords);
        assert!(detect_format(&dir.path().join("missing")).is_err());
    }
}
