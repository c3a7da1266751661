//! Header-named property appraiser CSV.
//!
//! Column names drift between yearly extracts, so headers are matched against
//! a table of known spellings rather than fixed positions.

use crate::db::property_repo::PropertyUpdate;
use crate::parser::fields::{self, field};
use crate::parser::{LineOutcome, ParcelRecord, ParsedRecord};

/// Property attribute a header can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppraiserField {
    ParcelId,
    Owner,
    Owner2,
    Street,
    City,
    Zip,
    MailingAddress,
    MailingCity,
    MailingState,
    MailingZip,
    PropertyType,
    JustValue,
    AssessedValue,
    BuildingSqft,
    LotSize,
    YearBuilt,
    Bedrooms,
    Bathrooms,
}

/// Normalized header names and the attribute each one feeds.
const HEADER_MAP: &[(&str, AppraiserField)] = &[
    ("FOLIO", AppraiserField::ParcelId),
    ("PTX_PRO_FOLIO", AppraiserField::ParcelId),
    ("FOLIONUMBER", AppraiserField::ParcelId),
    ("FOLIO_NUMBER", AppraiserField::ParcelId),
    ("PARCEL_ID", AppraiserField::ParcelId),
    ("PARCELID", AppraiserField::ParcelId),
    ("OWNER1", AppraiserField::Owner),
    ("OWNER1NAME", AppraiserField::Owner),
    ("OWNER_NAME_1", AppraiserField::Owner),
    ("OWNER_NAME", AppraiserField::Owner),
    ("OWNER", AppraiserField::Owner),
    ("OWNER2", AppraiserField::Owner2),
    ("OWNER_NAME_2", AppraiserField::Owner2),
    ("SITE_ADDR", AppraiserField::Street),
    ("SITEADDRESS", AppraiserField::Street),
    ("PROPERTYADDRESS", AppraiserField::Street),
    ("PROPERTY_ADDRESS", AppraiserField::Street),
    ("SITE_CITY", AppraiserField::City),
    ("SITECITY", AppraiserField::City),
    ("CITY", AppraiserField::City),
    ("SITE_ZIP", AppraiserField::Zip),
    ("SITEZIP", AppraiserField::Zip),
    ("ZIPCODE", AppraiserField::Zip),
    ("ZIP_CODE", AppraiserField::Zip),
    ("MAIL_ADDR", AppraiserField::MailingAddress),
    ("MAILADDR", AppraiserField::MailingAddress),
    ("MAILINGADDRESS", AppraiserField::MailingAddress),
    ("MAIL_CITY", AppraiserField::MailingCity),
    ("MAILINGCITY", AppraiserField::MailingCity),
    ("MAIL_STATE", AppraiserField::MailingState),
    ("MAILINGSTATE", AppraiserField::MailingState),
    ("MAIL_ZIP", AppraiserField::MailingZip),
    ("MAILINGZIP", AppraiserField::MailingZip),
    ("PRPTYUSE", AppraiserField::PropertyType),
    ("PROPERTY_USE", AppraiserField::PropertyType),
    ("PROPERTYUSE", AppraiserField::PropertyType),
    ("USE_CODE", AppraiserField::PropertyType),
    ("USECODE", AppraiserField::PropertyType),
    ("DOR_CODE", AppraiserField::PropertyType),
    ("JUST_VAL", AppraiserField::JustValue),
    ("JUSTVALUE", AppraiserField::JustValue),
    ("ASS_VAL", AppraiserField::AssessedValue),
    ("ASSVALUE", AppraiserField::AssessedValue),
    ("CURRENTASSESSEDVALUE", AppraiserField::AssessedValue),
    ("BLDG_SQFT", AppraiserField::BuildingSqft),
    ("SQFT", AppraiserField::BuildingSqft),
    ("SQFTG", AppraiserField::BuildingSqft),
    ("LIVING_AREA", AppraiserField::BuildingSqft),
    ("BUILDINGSQFT", AppraiserField::BuildingSqft),
    ("LOT_SIZE", AppraiserField::LotSize),
    ("LOTSQFT", AppraiserField::LotSize),
    ("YEAR_BUILT", AppraiserField::YearBuilt),
    ("YRBUILT", AppraiserField::YearBuilt),
    ("YEARBUILT", AppraiserField::YearBuilt),
    ("BEDROOMS", AppraiserField::Bedrooms),
    ("BEDS", AppraiserField::Bedrooms),
    ("BEDROOMCOUNT", AppraiserField::Bedrooms),
    ("BATHROOMS", AppraiserField::Bathrooms),
    ("BATHS", AppraiserField::Bathrooms),
    ("BATHROOMCOUNT", AppraiserField::Bathrooms),
];

/// Two-digit DOR property use codes.
const USE_CODE_TYPES: &[(&str, &str)] = &[
    ("01", "Single Family"),
    ("02", "Mobile Home"),
    ("03", "Multi-Family 2-9"),
    ("04", "Condo"),
    ("05", "Co-op"),
    ("06", "Retirement Home"),
    ("07", "Miscellaneous Residential"),
    ("08", "Multi-Family 10+"),
    ("10", "Vacant Commercial"),
    ("11", "Store"),
    ("12", "Store & Multiple Use"),
    ("14", "Supermarket"),
    ("17", "Office"),
    ("18", "Office & Multiple Use"),
    ("21", "Restaurant"),
    ("27", "Auto Sales"),
    ("33", "Nightclub"),
    ("39", "Hotel/Motel"),
    ("48", "Warehouse"),
    ("71", "Church"),
    ("83", "Health Care"),
];

/// Human-readable property type; unknown codes pass through unchanged.
pub fn property_type(code: &str) -> String {
    USE_CODE_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, t)| t.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Upper-cased, unquoted, with whitespace runs replaced by `_`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .replace('"', "")
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn lookup(header: &str) -> Option<AppraiserField> {
    HEADER_MAP
        .iter()
        .find(|(name, _)| *name == header)
        .map(|(_, f)| *f)
}

/// Column mapping of a header row. `None` unless some column names the parcel.
fn header_columns(line: &str) -> Option<Vec<Option<AppraiserField>>> {
    let upper = line.to_uppercase();
    if !upper.contains("FOLIO") && !upper.contains("PARCEL") {
        return None;
    }
    let mapped = fields::split_csv(line)
        .iter()
        .map(|h| lookup(&normalize_header(h)))
        .collect::<Vec<_>>();
    mapped
        .contains(&Some(AppraiserField::ParcelId))
        .then_some(mapped)
}

/// Whether a normalized header names the parcel id.
pub(crate) fn is_parcel_header(header: &str) -> bool {
    lookup(header) == Some(AppraiserField::ParcelId)
}

#[derive(Debug, Clone, Default)]
pub struct AppraiserParser {
    /// Field fed by each column, resolved from the header row.
    columns: Option<Vec<Option<AppraiserField>>>,
}

impl AppraiserParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_line(&mut self, line: &str) -> LineOutcome {
        if self.columns.is_none() {
            self.columns = header_columns(line);
            return LineOutcome::Skip;
        }
        let Some(columns) = &self.columns else {
            return LineOutcome::Skip;
        };

        let values = fields::split_csv(line);
        let mut parcel_id = None;
        let mut update = PropertyUpdate::default();

        for (index, column) in columns.iter().enumerate() {
            let Some(column) = column else { continue };
            let Some(value) = cell(field(&values, index)) else {
                continue;
            };
            apply(&mut update, &mut parcel_id, *column, value);
        }

        match parcel_id {
            Some(parcel_id) => LineOutcome::Record(ParsedRecord::Parcel(ParcelRecord {
                parcel_id,
                attributes: update,
            })),
            None => LineOutcome::Skip,
        }
    }
}

/// Trimmed cell value; `""`, `0` and `NULL` are missing.
fn cell(raw: &str) -> Option<&str> {
    let v = raw.trim();
    match v {
        "" | "0" | "NULL" => None,
        _ => Some(v),
    }
}

fn integer(value: &str) -> Option<i64> {
    fields::digits_only(value, false)
        .parse::<i64>()
        .ok()
        .filter(|v| *v != 0)
}

fn decimal(value: &str) -> Option<f64> {
    fields::parse_fraction(&fields::digits_only(value, true))
}

fn apply(
    update: &mut PropertyUpdate,
    parcel_id: &mut Option<String>,
    column: AppraiserField,
    value: &str,
) {
    let text = Some(value.to_string());
    match column {
        AppraiserField::ParcelId => *parcel_id = fields::parcel_id(value),
        AppraiserField::Owner => update.owner_name = text,
        AppraiserField::Owner2 => update.owner_name_2 = text,
        AppraiserField::Street => update.address_street = text,
        AppraiserField::City => update.address_city = text,
        AppraiserField::Zip => update.address_zip = text,
        AppraiserField::MailingAddress => update.mailing_address = text,
        AppraiserField::MailingCity => update.mailing_city = text,
        AppraiserField::MailingState => update.mailing_state = text,
        AppraiserField::MailingZip => update.mailing_zip = text,
        AppraiserField::PropertyType => update.property_type = Some(property_type(value)),
        AppraiserField::JustValue => update.just_value = decimal(value),
        AppraiserField::AssessedValue => update.assessed_value = decimal(value),
        AppraiserField::BuildingSqft => update.sqft = integer(value),
        AppraiserField::LotSize => update.lot_size = integer(value),
        AppraiserField::YearBuilt => update.year_built = integer(value),
        AppraiserField::Bedrooms => update.bedrooms = integer(value),
        AppraiserField::Bathrooms => update.baths = decimal(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(lines: &[&str]) -> Vec<LineOutcome> {
        let mut parser = AppraiserParser::new();
        lines.iter().map(|l| parser.parse_line(l)).collect()
    }

    fn parcel(outcome: &LineOutcome) -> &ParcelRecord {
        match outcome {
            LineOutcome::Record(ParsedRecord::Parcel(p)) => p,
            other => panic!("expected parcel, got {:?}", other),
        }
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(normalize_header(" \"Owner Name 1\" "), "OWNER_NAME_1");
        assert_eq!(normalize_header("SiteAddress"), "SITEADDRESS");
        assert_eq!(normalize_header("LIVING  AREA"), "LIVING_AREA");
    }

    #[test]
    fn test_header_driven_mapping() {
        let out = parse_all(&[
            "Extract generated 2026-01-01",
            "Folio,Owner1,SiteAddress,PRPTYUSE,JUST_VAL,Baths,YearBuilt,Bedrooms",
            "30-1234-567-0010,\"DOE, JANE\",100 MAIN ST,01,\"$350,000\",2.5,1978,NULL",
        ]);
        assert_eq!(out[0], LineOutcome::Skip);
        assert_eq!(out[1], LineOutcome::Skip);

        let p = parcel(&out[2]);
        assert_eq!(p.parcel_id, "3012345670010");
        assert_eq!(p.attributes.owner_name.as_deref(), Some("DOE, JANE"));
        assert_eq!(p.attributes.property_type.as_deref(), Some("Single Family"));
        assert_eq!(p.attributes.just_value, Some(350_000.0));
        assert_eq!(p.attributes.baths, Some(2.5));
        assert_eq!(p.attributes.year_built, Some(1978));
        assert_eq!(p.attributes.bedrooms, None);
    }

    #[test]
    fn test_preamble_mentioning_parcel_is_not_the_header() {
        let out = parse_all(&[
            "Parcel extract for Miami-Dade, generated 2026-01-01",
            "FOLIO,OWNER1,BEDROOMS",
            "0101,SMITH JOHN,4",
        ]);
        assert_eq!(out[0], LineOutcome::Skip);
        assert_eq!(out[1], LineOutcome::Skip);
        let p = parcel(&out[2]);
        assert_eq!(p.parcel_id, "0101");
        assert_eq!(p.attributes.bedrooms, Some(4));
    }

    #[test]
    fn test_unknown_use_code_passes_through() {
        let out = parse_all(&["FOLIO,USE_CODE", "0101,99"]);
        assert_eq!(parcel(&out[1]).attributes.property_type.as_deref(), Some("99"));
    }

    #[test]
    fn test_rows_without_parcel_are_skipped() {
        let out = parse_all(&["FOLIO,OWNER1", ",SMITH", "0,SMITH", "0101"]);
        assert_eq!(out[1], LineOutcome::Skip);
        assert_eq!(out[2], LineOutcome::Skip);
        let p = parcel(&out[3]);
        assert_eq!(p.parcel_id, "0101");
        assert_eq!(p.attributes.owner_name, None);
    }

    #[test]
    fn test_zero_values_are_null() {
        let out = parse_all(&["FOLIO,SQFT,ASS_VAL", "0101,0,"]);
        let p = parcel(&out[1]);
        assert_eq!(p.attributes.sqft, None);
        assert_eq!(p.attributes.assessed_value, None);
    }
}
