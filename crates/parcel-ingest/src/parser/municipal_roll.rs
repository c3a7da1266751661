//! Fixed-position municipal roll CSV (64 columns).

use chrono::{Months, NaiveDate};

use crate::config::MunicipalRollConfig;
use crate::db::property_repo::PropertyUpdate;
use crate::parser::fields::{self, field};
use crate::parser::{LineOutcome, ParcelRecord, ParsedRecord};

/// Records with fewer fields than this are malformed.
pub const MIN_FIELDS: usize = 40;

/// Folios shorter than this are placeholders, not parcels.
pub const MIN_FOLIO_LEN: usize = 10;

/// Longest extra-feature text kept per column.
const MAX_FEATURE_LEN: usize = 255;

/// DOR land use codes (first four characters of the land use column).
const LAND_USE_TYPES: &[(&str, &str)] = &[
    ("0000", "Vacant"),
    ("0001", "Single Family"),
    ("0002", "Mobile Home"),
    ("0004", "Condominium"),
    ("0005", "Co-op"),
    ("0006", "Multifamily 2-9"),
    ("0007", "Multifamily 10+"),
    ("0008", "Multifamily 100+"),
    ("0010", "Vacant Commercial"),
    ("0011", "Store"),
    ("0012", "Mixed Use"),
    ("0014", "Supermarket"),
    ("0017", "Office"),
    ("0018", "Professional"),
    ("0020", "Airport"),
    ("0023", "Financial"),
    ("0027", "Auto Sales"),
    ("0039", "Hotel"),
    ("0048", "Warehouse"),
];

pub fn land_use_type(code: &str) -> &'static str {
    LAND_USE_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, t)| *t)
        .unwrap_or("Other")
}

/// Column positions of one sale (date and amount).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleColumns {
    pub date: usize,
    pub amount: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MunicipalRollLayout {
    pub folio: usize,
    pub site_address: usize,
    pub site_city: usize,
    pub site_zip: usize,
    pub land_value: usize,
    pub building_value: usize,
    pub total_value: usize,
    pub assessed_value: usize,
    pub land_use: usize,
    pub zoning: usize,
    pub owner_1: usize,
    pub owner_2: usize,
    pub mailing_address: usize,
    pub mailing_city: usize,
    pub mailing_state: usize,
    pub mailing_zip: usize,
    pub adjusted_sqft: usize,
    pub lot_size: usize,
    pub bedrooms: usize,
    pub baths: usize,
    pub stories: usize,
    pub units: usize,
    pub year_built: usize,
    /// Most recent sale first.
    pub sales: [SaleColumns; 3],
    pub extra_features: [usize; 3],
}

impl Default for MunicipalRollLayout {
    fn default() -> Self {
        Self {
            folio: 0,
            site_address: 1,
            site_city: 2,
            site_zip: 3,
            land_value: 5,
            building_value: 6,
            total_value: 7,
            assessed_value: 8,
            land_use: 23,
            zoning: 24,
            owner_1: 25,
            owner_2: 26,
            mailing_address: 27,
            mailing_city: 28,
            mailing_state: 29,
            mailing_zip: 30,
            adjusted_sqft: 38,
            lot_size: 39,
            bedrooms: 40,
            baths: 41,
            stories: 42,
            units: 43,
            year_built: 44,
            sales: [
                SaleColumns { date: 48, amount: 49 },
                SaleColumns { date: 52, amount: 53 },
                SaleColumns { date: 56, amount: 57 },
            ],
            extra_features: [58, 59, 60],
        }
    }
}

#[derive(Debug, Clone)]
pub struct MunicipalRollParser {
    layout: MunicipalRollLayout,
    header_rows: u64,
    sale_cutoff: Option<NaiveDate>,
}

impl MunicipalRollParser {
    /// `today` anchors the optional sale-recency cutoff.
    pub fn new(config: &MunicipalRollConfig, today: NaiveDate) -> Self {
        let sale_cutoff = config
            .sale_cutoff_years
            .and_then(|years| today.checked_sub_months(Months::new(years.saturating_mul(12))));
        Self {
            layout: MunicipalRollLayout::default(),
            header_rows: config.header_rows as u64,
            sale_cutoff,
        }
    }

    /// `line_no` is 1-based and counts every physical line, blank or not.
    pub fn parse_line(&self, line_no: u64, line: &str) -> LineOutcome {
        if line_no <= self.header_rows {
            return LineOutcome::Skip;
        }
        if line.starts_with("F ") || line.starts_with("F,") {
            return LineOutcome::Skip;
        }

        let fields = fields::split_csv(line);
        if fields.len() < MIN_FIELDS {
            return LineOutcome::Skip;
        }
        let Some(parcel_id) = fields::parcel_id(field(&fields, self.layout.folio)) else {
            return LineOutcome::Skip;
        };
        if parcel_id.len() < MIN_FOLIO_LEN {
            return LineOutcome::Skip;
        }

        let attributes = self.attributes(&fields);
        if let Some(cutoff) = self.sale_cutoff {
            if !matches!(attributes.last_sale_date, Some(d) if d >= cutoff) {
                return LineOutcome::Skip;
            }
        }

        LineOutcome::Record(ParsedRecord::Parcel(ParcelRecord {
            parcel_id,
            attributes,
        }))
    }

    fn attributes(&self, fields: &[String]) -> PropertyUpdate {
        let l = &self.layout;
        let text = |i: usize| fields::text(field(fields, i));

        let land_use_code: Option<String> =
            text(l.land_use).map(|code| code.chars().take(4).collect());
        let property_type = land_use_code
            .as_deref()
            .map(|code| land_use_type(code).to_string());

        let zip = text(l.site_zip).and_then(|z| fields::text(z.split('-').next().unwrap_or("")));

        let features: Vec<Option<String>> = l
            .extra_features
            .iter()
            .map(|i| text(*i).map(|f| f.chars().take(MAX_FEATURE_LEN).collect()))
            .collect();
        let flags = feature_flags(&features);

        let sale = |n: usize| {
            let cols = l.sales[n];
            (
                fields::parse_date(field(fields, cols.date)),
                fields::parse_money(field(fields, cols.amount)),
            )
        };
        let (last_sale_date, last_sale_price) = sale(0);
        let (sale_2_date, sale_2_price) = sale(1);
        let (sale_3_date, sale_3_price) = sale(2);

        PropertyUpdate {
            address_street: text(l.site_address),
            address_city: text(l.site_city),
            address_zip: zip,
            address_state: Some("FL".to_string()),
            owner_name: text(l.owner_1),
            owner_name_2: text(l.owner_2),
            mailing_address: text(l.mailing_address),
            mailing_city: text(l.mailing_city),
            mailing_state: text(l.mailing_state),
            mailing_zip: text(l.mailing_zip),
            property_type,
            land_use_code,
            zoning: text(l.zoning),
            sqft: fields::parse_count(field(fields, l.adjusted_sqft)),
            lot_size: fields::parse_count(field(fields, l.lot_size)),
            bedrooms: fields::parse_count(field(fields, l.bedrooms)),
            baths: fields::parse_fraction(field(fields, l.baths)),
            stories: fields::parse_count(field(fields, l.stories)),
            units: fields::parse_count(field(fields, l.units)),
            year_built: fields::parse_count(field(fields, l.year_built)),
            land_value: fields::parse_money(field(fields, l.land_value)),
            building_value: fields::parse_money(field(fields, l.building_value)),
            just_value: fields::parse_money(field(fields, l.total_value)),
            assessed_value: fields::parse_money(field(fields, l.assessed_value)),
            last_sale_date,
            last_sale_price,
            sale_2_date,
            sale_2_price,
            sale_3_date,
            sale_3_price,
            has_pool: flags.map(|f| f.pool),
            has_fence: flags.map(|f| f.fence),
            has_patio: flags.map(|f| f.patio),
            has_sprinkler: flags.map(|f| f.sprinkler),
            has_elevator: flags.map(|f| f.elevator),
            has_central_ac: flags.map(|f| f.central_ac),
            extra_features_1: features[0].clone(),
            extra_features_2: features[1].clone(),
            extra_features_3: features[2].clone(),
            legal_description: None,
            fallback_owner: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeatureFlags {
    pool: bool,
    fence: bool,
    patio: bool,
    sprinkler: bool,
    elevator: bool,
    central_ac: bool,
}

/// Scans extra-feature text. `None` when no feature text is present at all,
/// so an empty roll row does not clear flags learned elsewhere.
fn feature_flags(features: &[Option<String>]) -> Option<FeatureFlags> {
    if features.iter().all(Option::is_none) {
        return None;
    }
    let all = features
        .iter()
        .map(|f| f.as_deref().unwrap_or("").to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    // Trailing space lets "ac" match at the end of the last column.
    let all = format!("{} ", all);
    Some(FeatureFlags {
        pool: all.contains("pool"),
        fence: all.contains("fence"),
        patio: all.contains("patio"),
        sprinkler: all.contains("sprinkler"),
        elevator: all.contains("elevator"),
        central_ac: all.contains("a/c") || all.contains("ac ") || all.contains("air cond"),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a 64-column roll row with the given values at their positions.
    pub(crate) fn row(values: &[(usize, &str)]) -> String {
        let mut fields = vec![String::new(); 64];
        for (i, v) in values {
            fields[*i] = if v.contains(',') {
                format!("\"{}\"", v)
            } else {
                v.to_string()
            };
        }
        fields.join(",")
    }

    fn parser(cutoff_years: Option<u32>) -> MunicipalRollParser {
        MunicipalRollParser::new(
            &MunicipalRollConfig {
                header_rows: 4,
                sale_cutoff_years: cutoff_years,
            },
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
    }

    fn parse(p: &MunicipalRollParser, line: &str) -> Option<ParcelRecord> {
        match p.parse_line(10, line) {
            LineOutcome::Record(ParsedRecord::Parcel(r)) => Some(r),
            _ => None,
        }
    }

    #[test]
    fn test_full_row() {
        let line = row(&[
            (0, "01-3114-029-0010"),
            (1, "100 NW 1 AVE"),
            (2, "MIAMI"),
            (3, "33128-1234"),
            (5, "150000"),
            (6, "$200,000"),
            (7, "350000"),
            (8, "300000"),
            (23, "0001 RESIDENTIAL - SINGLE FAMILY"),
            (24, "RS-1"),
            (25, "SMITH, JOHN"),
            (30, "33101"),
            (38, "1850"),
            (39, "7500"),
            (40, "3"),
            (41, "2.5"),
            (44, "1978"),
            (48, "06/01/2023"),
            (49, "250000"),
            (52, "19990315"),
            (53, "0"),
            (58, "Pool - Residential"),
            (59, "Central A/C"),
        ]);

        let record = parse(&parser(None), &line).unwrap();
        assert_eq!(record.parcel_id, "0131140290010");
        let a = &record.attributes;
        assert_eq!(a.address_zip.as_deref(), Some("33128"));
        assert_eq!(a.owner_name.as_deref(), Some("SMITH, JOHN"));
        assert_eq!(a.land_use_code.as_deref(), Some("0001"));
        assert_eq!(a.property_type.as_deref(), Some("Single Family"));
        assert_eq!(a.building_value, Some(200_000.0));
        assert_eq!(a.just_value, Some(350_000.0));
        assert_eq!(a.baths, Some(2.5));
        assert_eq!(a.last_sale_date, NaiveDate::from_ymd_opt(2023, 6, 1));
        assert_eq!(a.last_sale_price, Some(250_000.0));
        assert_eq!(a.sale_2_date, NaiveDate::from_ymd_opt(1999, 3, 15));
        assert_eq!(a.sale_2_price, None);
        assert_eq!(a.has_pool, Some(true));
        assert_eq!(a.has_central_ac, Some(true));
        assert_eq!(a.has_fence, Some(false));
    }

    #[test]
    fn test_header_footer_and_short_rows_skip() {
        let p = parser(None);
        let good = row(&[(0, "0131140290010")]);
        assert_eq!(p.parse_line(4, &good), LineOutcome::Skip);
        assert!(matches!(p.parse_line(5, &good), LineOutcome::Record(_)));
        assert_eq!(p.parse_line(9, "F,Total records: 12"), LineOutcome::Skip);
        assert_eq!(p.parse_line(9, "a,b,c"), LineOutcome::Skip);
        assert_eq!(p.parse_line(9, &row(&[(0, "12345")])), LineOutcome::Skip);
    }

    #[test]
    fn test_unknown_land_use_is_other() {
        let record = parse(&parser(None), &row(&[(0, "0131140290010"), (23, "9999")])).unwrap();
        assert_eq!(record.attributes.property_type.as_deref(), Some("Other"));
        assert_eq!(record.attributes.has_pool, None);
    }

    #[test]
    fn test_sale_cutoff() {
        let p = parser(Some(3));
        let recent = row(&[(0, "0131140290010"), (48, "20240101")]);
        let old = row(&[(0, "0131140290010"), (48, "20100101")]);
        let unsold = row(&[(0, "0131140290010")]);
        assert!(parse(&p, &recent).is_some());
        assert!(parse(&p, &old).is_none());
        assert!(parse(&p, &unsold).is_none());
    }
}
