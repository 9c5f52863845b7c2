// 🏗️ CSV Row Parsing - corporation and location import files
//
// Columns are addressed by header name, values are trimmed and blanks become
// None. Header problems are fatal; per-row problems are left to the importer,
// which skips the row with a warning.

use crate::entities::{Country, Location};
use crate::error::ImportError;
use anyhow::{Context, Result};
use csv::StringRecord;
use std::collections::HashMap;
use std::io::Read;
use uuid::Uuid;

pub const CORPORATION_REQUIRED: &[&str] = &["corporation_id"];
pub const LOCATION_REQUIRED: &[&str] = &["name", "state", "country"];

// ============================================================================
// HEADER INDEX
// ============================================================================

/// Column positions by header name
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_record(headers: &StringRecord) -> Self {
        let mut positions = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            // first occurrence wins on duplicate headers
            positions.entry(name.trim().to_string()).or_insert(idx);
        }
        HeaderIndex { positions }
    }

    pub fn has(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Trimmed value of `name` in `record`; missing column, short row or
    /// blank value all give None
    pub fn get(&self, record: &StringRecord, name: &str) -> Option<String> {
        let idx = *self.positions.get(name)?;
        let value = record.get(idx)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn require(&self, source_name: &'static str, required: &[&str]) -> Result<(), ImportError> {
        let columns: Vec<String> = required
            .iter()
            .filter(|name| !self.has(name))
            .map(|name| name.to_string())
            .collect();

        if columns.is_empty() {
            Ok(())
        } else {
            Err(ImportError::MissingColumns { source_name, columns })
        }
    }
}

/// Parse an optional coordinate. Unparsable or non-finite values are absent.
pub fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse an identifier column as a UUID
pub fn parse_id(value: Option<&str>) -> Option<Uuid> {
    value.and_then(|v| Uuid::parse_str(v.trim()).ok())
}

// ============================================================================
// ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CorporationRow {
    /// 1-based line in the source file
    pub line: u64,
    pub corporation_id: Option<String>,
    pub legal_name: Option<String>,
    pub doing_business_as: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRow {
    pub line: u64,
    pub id: Option<String>,
    pub corporation_id: Option<String>,
    pub doing_business_as: Option<String>,
    pub website: Option<String>,
    pub name: Option<String>,
    pub street_address: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Country,
    pub postal_code: Option<String>,
    pub store_id: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub h3_cell: Option<String>,
}

impl LocationRow {
    /// Materialize the row as a location owned by `corporation_id`
    pub fn to_location(&self, id: Uuid, corporation_id: Uuid) -> Location {
        Location {
            id,
            corporation_id,
            name: self.name.clone(),
            street_address: self.street_address.clone(),
            address_line_1: self.address_line_1.clone(),
            address_line_2: self.address_line_2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country,
            postal_code: self.postal_code.clone(),
            store_id: self.store_id.clone(),
            lat: self.lat,
            lon: self.lon,
            h3_cell: self.h3_cell.clone(),
        }
    }
}

// ============================================================================
// READERS
// ============================================================================

/// Read every record of a CSV source with its 1-based line. Returns None
/// when the source has no header row at all.
///
/// Fields that are not valid UTF-8 (Latin-1 exports are common) are decoded
/// lossily and the row is kept.
fn read_records<R: Read>(reader: R) -> Result<Option<(HeaderIndex, Vec<(u64, StringRecord)>)>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = rdr.byte_headers().context("Failed to read CSV header")?.clone();
    let headers = StringRecord::from_byte_record_lossy(headers);
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Ok(None);
    }

    let mut records = Vec::new();
    for record in rdr.byte_records() {
        let record = record.context("Failed to parse CSV record")?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if std::str::from_utf8(record.as_slice()).is_err() {
            tracing::warn!(line, "Record is not valid UTF-8, replacing undecodable bytes");
        }
        records.push((line, StringRecord::from_byte_record_lossy(record)));
    }

    Ok(Some((HeaderIndex::from_record(&headers), records)))
}

pub fn read_corporation_rows<R: Read>(reader: R) -> Result<Vec<CorporationRow>> {
    let Some((index, records)) = read_records(reader)? else {
        tracing::warn!("corporations CSV is empty");
        return Ok(Vec::new());
    };
    index.require("corporations", CORPORATION_REQUIRED)?;

    Ok(records
        .iter()
        .map(|(line, record)| CorporationRow {
            line: *line,
            corporation_id: index.get(record, "corporation_id"),
            legal_name: index.get(record, "legal_name"),
            doing_business_as: index.get(record, "doing_business_as"),
            website: index.get(record, "website"),
        })
        .collect())
}

pub fn read_location_rows<R: Read>(reader: R) -> Result<Vec<LocationRow>> {
    let Some((index, records)) = read_records(reader)? else {
        tracing::warn!("locations CSV is empty");
        return Ok(Vec::new());
    };
    index.require("locations", LOCATION_REQUIRED)?;
    if !index.has("city") && !index.has("city1") {
        return Err(ImportError::MissingColumns {
            source_name: "locations",
            columns: vec!["city (or city1)".to_string()],
        }
        .into());
    }

    Ok(records
        .iter()
        .map(|(line, record)| {
            let field = |name: &str| index.get(record, name);
            LocationRow {
                line: *line,
                id: field("id"),
                corporation_id: field("corporation_id"),
                doing_business_as: field("doing_business_as"),
                website: field("website"),
                name: field("name"),
                street_address: field("street_address"),
                address_line_1: field("address_line_1"),
                address_line_2: field("address_line_2"),
                city: field("city").or_else(|| field("city1")),
                state: field("state"),
                country: Country::parse(field("country").as_deref()),
                postal_code: field("postal_code"),
                store_id: field("store_id"),
                lat: parse_coordinate(field("lat").as_deref()),
                lon: parse_coordinate(field("lon").as_deref()),
                h3_cell: field("h3_cell"),
            }
        })
        .collect())
}
