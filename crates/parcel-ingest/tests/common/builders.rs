//! Builders for source-file fixtures.
//!
//! Column positions match the default layouts of each parser, so tests can
//! state only the fields they care about.

#![allow(dead_code)]

/// Field count of a recording office export line.
pub const OFFICIAL_FIELDS: usize = 42;
/// Column count of a municipal roll row.
pub const ROLL_FIELDS: usize = 64;

/// Builds a caret-delimited recording office line.
pub fn official_line(values: &[(usize, &str)]) -> String {
    let mut fields = vec![String::new(); OFFICIAL_FIELDS];
    for (i, v) in values {
        fields[*i] = v.to_string();
    }
    fields.join("^")
}

/// Builder for one recorded instrument.
pub struct InstrumentBuilder {
    code: String,
    folio: String,
    date: String,
    first_party: String,
    cross_party: String,
    consideration: String,
}

impl InstrumentBuilder {
    pub fn new(code: &str, folio: &str) -> Self {
        Self {
            code: code.to_string(),
            folio: folio.to_string(),
            date: String::new(),
            first_party: String::new(),
            cross_party: String::new(),
            consideration: String::new(),
        }
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    pub fn first_party(mut self, name: &str) -> Self {
        self.first_party = name.to_string();
        self
    }

    pub fn cross_party(mut self, name: &str) -> Self {
        self.cross_party = name.to_string();
        self
    }

    pub fn consideration(mut self, amount: &str) -> Self {
        self.consideration = amount.to_string();
        self
    }

    pub fn build(self) -> String {
        official_line(&[
            (3, &self.date),
            (10, &self.code),
            (13, &self.first_party),
            (15, &self.cross_party),
            (22, &self.folio),
            (31, &self.consideration),
        ])
    }
}

/// Builds a 64-column roll row; values containing commas are quoted.
pub fn roll_row(values: &[(usize, &str)]) -> String {
    let mut fields = vec![String::new(); ROLL_FIELDS];
    for (i, v) in values {
        fields[*i] = if v.contains(',') {
            format!("\"{}\"", v)
        } else {
            v.to_string()
        };
    }
    fields.join(",")
}

/// A roll file: four preamble rows, the given rows, then a footer.
pub fn roll_file(rows: &[String]) -> String {
    let mut lines = vec![
        "Municipal Extract - Roll year 2025".to_string(),
        "Data is provided as is without warranty".to_string(),
        "Generated for bulk download".to_string(),
        "FOLIO,SITE_ADDR,SITE_CITY,SITE_ZIP".to_string(),
    ];
    lines.extend(rows.iter().cloned());
    lines.push("F,END OF FILE".to_string());
    lines.join("\n") + "\n"
}

/// Builds an appraiser CSV from a header and rows.
pub fn appraiser_csv(header: &[&str], rows: &[&[&str]]) -> String {
    let mut out = header.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Joins lines into file content with a trailing newline.
pub fn lines(lines: &[String]) -> String {
    lines.join("\n") + "\n"
}
