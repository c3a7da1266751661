//! Appraiser legal-description extract.
//!
//! The extract carries one row per line of legal text, sorted by folio. Rows
//! for the same folio are joined with a space into one description, emitted
//! when the folio changes and once more at end of input.

use crate::db::property_repo::PropertyUpdate;
use crate::parser::appraiser::{is_parcel_header, normalize_header};
use crate::parser::fields::{self, field};
use crate::parser::{LineOutcome, ParcelRecord, ParsedRecord};

const LEGAL_HEADERS: &[&str] = &["LEGALDESCRIPTION", "LEGAL_DESCRIPTION", "LEGAL"];

/// Whether a normalized header names the legal text column.
pub fn is_legal_header(header: &str) -> bool {
    LEGAL_HEADERS.contains(&header)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    folio: usize,
    legal: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LegalDescriptionParser {
    columns: Option<Columns>,
    /// Folio being accumulated and its legal lines so far.
    current: Option<(String, Vec<String>)>,
}

impl LegalDescriptionParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_line(&mut self, line: &str) -> LineOutcome {
        let Some(columns) = self.columns else {
            self.columns = header_columns(line);
            return LineOutcome::Skip;
        };

        let values = fields::split_csv(line);
        if values.len() < 2 {
            return LineOutcome::Skip;
        }
        let Some(folio) = fields::parcel_id(field(&values, columns.folio)) else {
            return LineOutcome::Skip;
        };
        let text = fields::text(field(&values, columns.legal));

        if let Some((current, lines)) = &mut self.current {
            if *current == folio {
                lines.extend(text);
                return LineOutcome::Buffered(None);
            }
        }
        let previous = self.current.replace((folio, text.into_iter().collect()));
        LineOutcome::Buffered(previous.and_then(to_record))
    }

    /// The description still being accumulated, at end of input.
    pub fn flush(&mut self) -> Option<ParsedRecord> {
        self.current.take().and_then(to_record)
    }
}

fn header_columns(line: &str) -> Option<Columns> {
    let headers: Vec<String> = fields::split_csv(line)
        .iter()
        .map(|h| normalize_header(h))
        .collect();
    let folio = headers.iter().position(|h| is_parcel_header(h))?;
    let legal = headers.iter().position(|h| is_legal_header(h))?;
    Some(Columns { folio, legal })
}

fn to_record((parcel_id, lines): (String, Vec<String>)) -> Option<ParsedRecord> {
    if lines.is_empty() {
        return None;
    }
    Some(ParsedRecord::Parcel(ParcelRecord {
        parcel_id,
        attributes: PropertyUpdate {
            legal_description: Some(lines.join(" ")),
            ..Default::default()
        },
    }))
}
