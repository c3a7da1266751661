//! Property repository — coalescing upserts into the canonical `properties` table.
//!
//! Every write follows the same rule: a column takes the incoming value when
//! one is supplied, and keeps what is stored otherwise. A null never erases
//! a known value.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

/// Attribute columns in bind order, shared by the insert and update statements.
const COLUMNS: [&str; 40] = [
    "address_street",
    "address_city",
    "address_zip",
    "address_state",
    "owner_name",
    "owner_name_2",
    "mailing_address",
    "mailing_city",
    "mailing_state",
    "mailing_zip",
    "property_type",
    "land_use_code",
    "zoning",
    "sqft",
    "lot_size",
    "bedrooms",
    "baths",
    "stories",
    "units",
    "year_built",
    "land_value",
    "building_value",
    "just_value",
    "assessed_value",
    "last_sale_date",
    "last_sale_price",
    "sale_2_date",
    "sale_2_price",
    "sale_3_date",
    "sale_3_price",
    "has_pool",
    "has_fence",
    "has_patio",
    "has_sprinkler",
    "has_elevator",
    "has_central_ac",
    "extra_features_1",
    "extra_features_2",
    "extra_features_3",
    "legal_description",
];

/// A partial set of property attributes; `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUpdate {
    pub address_street: Option<String>,
    pub address_city: Option<String>,
    pub address_zip: Option<String>,
    pub address_state: Option<String>,
    pub owner_name: Option<String>,
    pub owner_name_2: Option<String>,
    pub mailing_address: Option<String>,
    pub mailing_city: Option<String>,
    pub mailing_state: Option<String>,
    pub mailing_zip: Option<String>,
    pub property_type: Option<String>,
    pub land_use_code: Option<String>,
    pub zoning: Option<String>,
    pub sqft: Option<i64>,
    pub lot_size: Option<i64>,
    pub bedrooms: Option<i64>,
    pub baths: Option<f64>,
    pub stories: Option<i64>,
    pub units: Option<i64>,
    pub year_built: Option<i64>,
    pub land_value: Option<f64>,
    pub building_value: Option<f64>,
    pub just_value: Option<f64>,
    pub assessed_value: Option<f64>,
    pub last_sale_date: Option<NaiveDate>,
    pub last_sale_price: Option<f64>,
    pub sale_2_date: Option<NaiveDate>,
    pub sale_2_price: Option<f64>,
    pub sale_3_date: Option<NaiveDate>,
    pub sale_3_price: Option<f64>,
    pub has_pool: Option<bool>,
    pub has_fence: Option<bool>,
    pub has_patio: Option<bool>,
    pub has_sprinkler: Option<bool>,
    pub has_elevator: Option<bool>,
    pub has_central_ac: Option<bool>,
    pub extra_features_1: Option<String>,
    pub extra_features_2: Option<String>,
    pub extra_features_3: Option<String>,
    /// Joined multi-line legal text from the appraiser legal extract.
    pub legal_description: Option<String>,
    /// Owner used only when the parcel is new; never applied to an existing row.
    #[serde(skip)]
    pub fallback_owner: Option<String>,
}

impl PropertyUpdate {
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.address_street),
            text(&self.address_city),
            text(&self.address_zip),
            text(&self.address_state),
            text(&self.owner_name),
            text(&self.owner_name_2),
            text(&self.mailing_address),
            text(&self.mailing_city),
            text(&self.mailing_state),
            text(&self.mailing_zip),
            text(&self.property_type),
            text(&self.land_use_code),
            text(&self.zoning),
            int(self.sqft),
            int(self.lot_size),
            int(self.bedrooms),
            real(self.baths),
            int(self.stories),
            int(self.units),
            int(self.year_built),
            real(self.land_value),
            real(self.building_value),
            real(self.just_value),
            real(self.assessed_value),
            date(self.last_sale_date),
            real(self.last_sale_price),
            date(self.sale_2_date),
            real(self.sale_2_price),
            date(self.sale_3_date),
            real(self.sale_3_price),
            flag(self.has_pool),
            flag(self.has_fence),
            flag(self.has_patio),
            flag(self.has_sprinkler),
            flag(self.has_elevator),
            flag(self.has_central_ac),
            text(&self.extra_features_1),
            text(&self.extra_features_2),
            text(&self.extra_features_3),
            text(&self.legal_description),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            address_street: row.get("address_street")?,
            address_city: row.get("address_city")?,
            address_zip: row.get("address_zip")?,
            address_state: row.get("address_state")?,
            owner_name: row.get("owner_name")?,
            owner_name_2: row.get("owner_name_2")?,
            mailing_address: row.get("mailing_address")?,
            mailing_city: row.get("mailing_city")?,
            mailing_state: row.get("mailing_state")?,
            mailing_zip: row.get("mailing_zip")?,
            property_type: row.get("property_type")?,
            land_use_code: row.get("land_use_code")?,
            zoning: row.get("zoning")?,
            sqft: row.get("sqft")?,
            lot_size: row.get("lot_size")?,
            bedrooms: row.get("bedrooms")?,
            baths: row.get("baths")?,
            stories: row.get("stories")?,
            units: row.get("units")?,
            year_built: row.get("year_built")?,
            land_value: row.get("land_value")?,
            building_value: row.get("building_value")?,
            just_value: row.get("just_value")?,
            assessed_value: row.get("assessed_value")?,
            last_sale_date: get_date(row, "last_sale_date")?,
            last_sale_price: row.get("last_sale_price")?,
            sale_2_date: get_date(row, "sale_2_date")?,
            sale_2_price: row.get("sale_2_price")?,
            sale_3_date: get_date(row, "sale_3_date")?,
            sale_3_price: row.get("sale_3_price")?,
            has_pool: row.get("has_pool")?,
            has_fence: row.get("has_fence")?,
            has_patio: row.get("has_patio")?,
            has_sprinkler: row.get("has_sprinkler")?,
            has_elevator: row.get("has_elevator")?,
            has_central_ac: row.get("has_central_ac")?,
            extra_features_1: row.get("extra_features_1")?,
            extra_features_2: row.get("extra_features_2")?,
            extra_features_3: row.get("extra_features_3")?,
            legal_description: row.get("legal_description")?,
            fallback_owner: None,
        })
    }
}

fn text(v: &Option<String>) -> Value {
    v.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

fn real(v: Option<f64>) -> Value {
    v.map(Value::Real).unwrap_or(Value::Null)
}

fn date(v: Option<NaiveDate>) -> Value {
    v.map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

fn flag(v: Option<bool>) -> Value {
    v.map(|b| Value::Integer(b as i64)).unwrap_or(Value::Null)
}

fn get_date(row: &Row<'_>, column: &str) -> Result<Option<NaiveDate>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// A stored property row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRow {
    pub parcel_id: String,
    pub county: String,
    #[serde(flatten)]
    pub attributes: PropertyUpdate,
    pub created_at: String,
    pub updated_at: String,
}

/// Whether an upsert created the parcel or merged into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

fn insert_sql() -> String {
    let placeholders: Vec<String> = (0..COLUMNS.len()).map(|i| format!("?{}", i + 3)).collect();
    let ts = COLUMNS.len() + 3;
    format!(
        "INSERT INTO properties (parcel_id, county, {}, created_at, updated_at)
         VALUES (?1, ?2, {}, ?{ts}, ?{ts})",
        COLUMNS.join(", "),
        placeholders.join(", "),
    )
}

fn update_sql() -> String {
    let sets: Vec<String> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = COALESCE(?{}, {col})", i + 3))
        .collect();
    format!(
        "UPDATE properties SET county = COALESCE(county, ?2), {}, updated_at = ?{}
         WHERE parcel_id = ?1",
        sets.join(", "),
        COLUMNS.len() + 3
    )
}

/// Inserts or merges one parcel. `conn` is usually an open transaction.
pub fn upsert(
    conn: &Connection,
    parcel_id: &str,
    county: &str,
    update: &PropertyUpdate,
    now: &str,
) -> Result<UpsertOutcome, DatabaseError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM properties WHERE parcel_id = ?1",
            params![parcel_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    let mut values = Vec::with_capacity(COLUMNS.len() + 3);
    values.push(Value::Text(parcel_id.to_string()));
    values.push(Value::Text(county.to_string()));
    values.extend(update.values());
    values.push(Value::Text(now.to_string()));

    if exists {
        let mut stmt = conn.prepare_cached(&update_sql())?;
        stmt.execute(params_from_iter(values))?;
        Ok(UpsertOutcome::Updated)
    } else {
        if update.owner_name.is_none() {
            // owner_name sits right after parcel_id, county and four address columns.
            values[6] = text(&update.fallback_owner);
        }
        let mut stmt = conn.prepare_cached(&insert_sql())?;
        stmt.execute(params_from_iter(values))?;
        Ok(UpsertOutcome::Inserted)
    }
}

/// Finds a property by parcel id.
pub fn find(db: &Database, parcel_id: &str) -> Result<Option<PropertyRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM properties WHERE parcel_id = ?1",
                params![parcel_id],
                |row| {
                    Ok(PropertyRow {
                        parcel_id: row.get("parcel_id")?,
                        county: row.get("county")?,
                        attributes: PropertyUpdate::from_row(row)?,
                        created_at: row.get("created_at")?,
                        updated_at: row.get("updated_at")?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

/// Counts stored properties, optionally for one county.
pub fn count(db: &Database, county: Option<&str>) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let n: i64 = match county {
            Some(c) => conn.query_row(
                "SELECT COUNT(*) FROM properties WHERE county = ?1",
                params![c],
                |r| r.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM properties", [], |r| r.get(0))?,
        };
        Ok(n as u64)
    })
}
