//! Field-level normalization shared by every parsing strategy.

use chrono::NaiveDate;
use csv::ReaderBuilder;

/// Returns the field at `index`, or `""` when the line is short.
pub fn field<S: AsRef<str>>(fields: &[S], index: usize) -> &str {
    fields.get(index).map(|s| s.as_ref()).unwrap_or("")
}

/// Trimmed text; blank becomes `None`.
pub fn text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Canonical parcel id: quotes, whitespace and dashes removed.
pub fn parcel_id(raw: &str) -> Option<String> {
    let id: String = raw
        .chars()
        .filter(|c| *c != '"' && *c != '-' && !c.is_whitespace())
        .collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Parses an 8-digit date after removing `/` and `-`.
///
/// Year-first (`YYYYMMDD`) when the digits start with `19` or `20`,
/// month-first (`MMDDYYYY`) otherwise. Out-of-range parts yield `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let digits: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '/' && *c != '-')
        .collect();
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (year, month, day) = if digits.starts_with("19") || digits.starts_with("20") {
        (&digits[0..4], &digits[4..6], &digits[6..8])
    } else {
        (&digits[4..8], &digits[0..2], &digits[2..4])
    };
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;

    if !(1900..=2100).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a money amount with `,` and `$` stripped. Zero, negative and
/// unparsable amounts are `None`.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '$').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Parses a count such as square footage or year built. Commas are ignored,
/// a fractional part is truncated, and zero means unknown.
pub fn parse_count(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?;
    let value = value.trunc() as i64;
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

/// Parses a fractional quantity such as bathrooms; zero means unknown.
pub fn parse_fraction(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v != 0.0)
}

/// Keeps only ASCII digits (and the decimal point when `keep_point`).
pub fn digits_only(raw: &str, keep_point: bool) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || (keep_point && *c == '.'))
        .collect()
}

/// Splits one CSV line, honoring quotes and doubled-quote escapes.
/// Fields are trimmed. A line the reader cannot parse yields no fields.
pub fn split_csv(line: &str) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(|s| s.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}
