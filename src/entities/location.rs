// 📍 Location Entity - a physical site owned by exactly one corporation
//
// De-duplicated within its corporation by store id, or by
// (name, city, state) when no store id is known.

use crate::diff::{sync_value, Field};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// COUNTRY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Country {
    #[default]
    USA,
    CAN,
}

impl Country {
    /// Permissive parse: "CAN" / "Canada" in any case is Canada, anything
    /// else (including absent or unknown values) is USA.
    pub fn parse(value: Option<&str>) -> Country {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("CAN") || v.eq_ignore_ascii_case("Canada") => {
                Country::CAN
            }
            _ => Country::USA,
        }
    }

    /// Code persisted in the store
    pub fn code(&self) -> &'static str {
        match self {
            Country::USA => "USA",
            Country::CAN => "CAN",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Country::USA => "USA",
            Country::CAN => "Canada",
        }
    }
}

// ============================================================================
// LOCATION ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Stable identity, taken from the import row
    pub id: Uuid,

    /// Owning corporation (non-null)
    pub corporation_id: Uuid,

    pub name: Option<String>,
    pub street_address: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Country,
    pub postal_code: Option<String>,

    /// Expected unique within the owning corporation
    pub store_id: Option<String>,

    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub h3_cell: Option<String>,
}

impl Location {
    /// Create an empty location owned by `corporation_id`
    pub fn new(id: Uuid, corporation_id: Uuid) -> Self {
        Location {
            id,
            corporation_id,
            name: None,
            street_address: None,
            address_line_1: None,
            address_line_2: None,
            city: None,
            state: None,
            country: Country::USA,
            postal_code: None,
            store_id: None,
            lat: None,
            lon: None,
            h3_cell: None,
        }
    }

    /// Builder pattern: set name / city / state
    pub fn with_site(mut self, name: &str, city: &str, state: &str) -> Self {
        self.name = Some(name.to_string());
        self.city = Some(city.to_string());
        self.state = Some(state.to_string());
        self
    }

    /// Builder pattern: set store id
    pub fn with_store_id(mut self, store_id: &str) -> Self {
        self.store_id = Some(store_id.to_string());
        self
    }
}

// ============================================================================
// MUTABLE FIELDS
// ============================================================================

macro_rules! location_field {
    ($attr:ident) => {
        Field {
            name: stringify!($attr),
            sync: |target: &mut Location, incoming: &Location| {
                sync_value(&mut target.$attr, &incoming.$attr)
            },
        }
    };
}

/// The twelve attributes reconciled when an import row matches an existing
/// location. Identity and ownership are not part of the diff.
pub const LOCATION_FIELDS: [Field<Location>; 12] = [
    location_field!(name),
    location_field!(street_address),
    location_field!(address_line_1),
    location_field!(address_line_2),
    location_field!(city),
    location_field!(state),
    location_field!(country),
    location_field!(postal_code),
    location_field!(store_id),
    location_field!(lat),
    location_field!(lon),
    location_field!(h3_cell),
];
