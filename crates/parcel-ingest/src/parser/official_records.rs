//! Caret-delimited recording office exports.

use crate::classify::classify;
use crate::parser::fields::{self, field};
use crate::parser::{InstrumentRecord, LineOutcome, ParsedRecord};

/// Lines with fewer fields than this are malformed.
pub const MIN_FIELDS: usize = 32;

/// Column positions of the recording office export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfficialRecordsLayout {
    pub record_year: usize,
    pub record_sequence: usize,
    pub recording_date: usize,
    pub document_type: usize,
    pub document_description: usize,
    pub first_party: usize,
    pub first_party_code: usize,
    pub cross_party: usize,
    pub subdivision: usize,
    pub folio: usize,
    pub legal_description: usize,
    pub case_number: usize,
    pub consideration: usize,
    pub consideration_2: usize,
    pub key: usize,
    pub transaction_type: usize,
}

impl Default for OfficialRecordsLayout {
    fn default() -> Self {
        Self {
            record_year: 0,
            record_sequence: 1,
            recording_date: 3,
            document_type: 10,
            document_description: 11,
            first_party: 13,
            first_party_code: 14,
            cross_party: 15,
            subdivision: 21,
            folio: 22,
            legal_description: 23,
            case_number: 30,
            consideration: 31,
            consideration_2: 32,
            key: 38,
            transaction_type: 39,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OfficialRecordsParser {
    layout: OfficialRecordsLayout,
}

impl OfficialRecordsParser {
    pub fn parse_line(&self, line: &str) -> LineOutcome {
        let fields: Vec<&str> = line.split('^').collect();
        if fields.len() < MIN_FIELDS {
            return LineOutcome::Skip;
        }

        let l = &self.layout;
        let Some(parcel_id) = fields::parcel_id(field(&fields, l.folio)) else {
            return LineOutcome::Skip;
        };
        let document_type = field(&fields, l.document_type).trim().to_ascii_uppercase();
        let trimmed = |i: usize| field(&fields, i).trim().to_string();

        LineOutcome::Record(ParsedRecord::Instrument(InstrumentRecord {
            record_year: field(&fields, l.record_year)
                .trim()
                .parse()
                .ok()
                .filter(|y| *y != 0),
            record_sequence: field(&fields, l.record_sequence)
                .trim()
                .parse()
                .ok()
                .filter(|s| *s != 0),
            recording_date: fields::parse_date(field(&fields, l.recording_date)),
            classification: classify(&document_type),
            document_type,
            document_description: trimmed(l.document_description),
            parcel_id,
            first_party: trimmed(l.first_party),
            first_party_code: trimmed(l.first_party_code),
            cross_party: trimmed(l.cross_party),
            subdivision: trimmed(l.subdivision),
            legal_description: trimmed(l.legal_description),
            case_number: trimmed(l.case_number),
            consideration: fields::parse_money(field(&fields, l.consideration)),
            consideration_2: fields::parse_money(field(&fields, l.consideration_2)),
            key: trimmed(l.key),
            transaction_type: trimmed(l.transaction_type),
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classify::Classification;
    use chrono::NaiveDate;

    /// Builds a 42-field line with the given values at their positions.
    pub(crate) fn line(values: &[(usize, &str)]) -> String {
        let mut fields = vec![String::new(); 42];
        for (i, v) in values {
            fields[*i] = v.to_string();
        }
        fields.join("^")
    }

    fn parse(line: &str) -> Option<InstrumentRecord> {
        match OfficialRecordsParser::default().parse_line(line) {
            LineOutcome::Record(ParsedRecord::Instrument(r)) => Some(r),
            _ => None,
        }
    }

    #[test]
    fn test_warranty_deed_line() {
        let record = parse(&line(&[
            (0, "2023"),
            (1, "000456"),
            (3, "20230615"),
            (10, "wd "),
            (11, "WARRANTY DEED"),
            (13, "DOE JANE"),
            (15, "SMITH JOHN"),
            (22, "\"30-1234-567-0010\""),
            (31, "185000.00"),
            (39, "S"),
        ]))
        .unwrap();

        assert_eq!(record.parcel_id, "3012345670010");
        assert_eq!(record.document_type, "WD");
        assert_eq!(record.classification, Classification::Deed);
        assert!(record.is_deed());
        assert!(!record.is_distress());
        assert_eq!(record.recording_date, NaiveDate::from_ymd_opt(2023, 6, 15));
        assert_eq!(record.consideration, Some(185_000.0));
        assert_eq!(record.consideration_2, None);
        assert_eq!(record.record_year, Some(2023));
        assert_eq!(record.record_sequence, Some(456));
        assert_eq!(record.first_party, "DOE JANE");
        assert_eq!(record.transaction_type, "S");
    }

    #[test]
    fn test_zero_consideration_is_null() {
        let record = parse(&line(&[(10, "WD"), (22, "0101"), (31, "0.00")])).unwrap();
        assert_eq!(record.consideration, None);
    }

    #[test]
    fn test_short_line_is_skipped() {
        let short = vec!["x"; 31].join("^");
        assert_eq!(
            OfficialRecordsParser::default().parse_line(&short),
            LineOutcome::Skip
        );
        assert_eq!(
            OfficialRecordsParser::default().parse_line("no carets here"),
            LineOutcome::Skip
        );
    }

    #[test]
    fn test_minimum_width_line_parses() {
        let mut fields = vec![""; 32];
        fields[10] = "LP";
        fields[22] = "0101";
        let record = parse(&fields.join("^")).unwrap();
        assert!(record.is_distress());
        assert_eq!(record.key, "");
    }

    #[test]
    fn test_missing_folio_is_skipped() {
        assert!(parse(&line(&[(10, "WD"), (22, " - ")])).is_none());
    }

    #[test]
    fn test_invalid_recording_date_is_null() {
        let record = parse(&line(&[(3, "20231345"), (10, "WD"), (22, "0101")])).unwrap();
        assert_eq!(record.recording_date, None);
    }
}
