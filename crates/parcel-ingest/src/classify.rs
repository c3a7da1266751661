//! Document-type classification for recorded instruments.

use serde::{Deserialize, Serialize};

/// Instruments that transfer title.
pub const DEED_CODES: [&str; 9] = ["WD", "QCD", "TD", "CD", "PRD", "SPD", "GD", "LD", "DEED"];

/// Instruments that signal financial distress on a parcel.
pub const DISTRESS_CODES: [&str; 6] = ["LP", "NDS", "LIEN", "TAXL", "JUD", "FORE"];

/// Foreclosure status written for notices of default and foreclosures.
pub const PRE_FORECLOSURE: &str = "pre_foreclosure";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Deed,
    Distress,
    Ignorable,
}

/// Classifies a document type code. Codes are compared trimmed and upper-cased.
pub fn classify(code: &str) -> Classification {
    let code = code.trim().to_ascii_uppercase();
    if DEED_CODES.contains(&code.as_str()) {
        Classification::Deed
    } else if DISTRESS_CODES.contains(&code.as_str()) {
        Classification::Distress
    } else {
        Classification::Ignorable
    }
}

/// Which classes of instrument a parse emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyFilter {
    /// Emit deeds. When false, ignorable instruments are emitted instead.
    pub filter_deeds: bool,
    pub include_distress: bool,
}

impl Default for ClassifyFilter {
    fn default() -> Self {
        Self {
            filter_deeds: true,
            include_distress: true,
        }
    }
}

impl ClassifyFilter {
    pub fn admits(&self, class: Classification) -> bool {
        match class {
            Classification::Deed => self.filter_deeds,
            Classification::Distress => self.include_distress,
            Classification::Ignorable => !self.filter_deeds,
        }
    }
}

/// Legal-status flags raised by one distress instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistressFlags {
    pub lis_pendens: bool,
    pub tax_lien: bool,
    pub foreclosure_status: Option<&'static str>,
}

/// Maps a distress code to the flags it raises. `None` when the code raises
/// nothing (judgments, and every non-distress code).
pub fn distress_flags(code: &str) -> Option<DistressFlags> {
    let flags = match code.trim().to_ascii_uppercase().as_str() {
        "LP" => DistressFlags {
            lis_pendens: true,
            ..Default::default()
        },
        "LIEN" | "TAXL" => DistressFlags {
            tax_lien: true,
            ..Default::default()
        },
        "FORE" | "NDS" => DistressFlags {
            foreclosure_status: Some(PRE_FORECLOSURE),
            ..Default::default()
        },
        _ => return None,
    };
    Some(flags)
}
