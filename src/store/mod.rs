// 🗄️ Record Store - keyed storage for corporations and locations
//
// The import pipeline only talks to this trait. SqliteStore is the durable
// implementation; StagedStore layers pending writes over a read-only store
// so a dry run sees its own would-be writes without persisting them.

pub mod sqlite;
pub mod staged;

pub use sqlite::SqliteStore;
pub use staged::StagedStore;

use crate::entities::{Corporation, CorporationKey, Location};
use anyhow::Result;
use uuid::Uuid;

pub trait RecordStore {
    fn corporation_by_id(&self, id: Uuid) -> Result<Option<Corporation>>;

    /// Earliest stored corporation whose `key` equals `value` exactly
    fn corporation_by_key(&self, key: CorporationKey, value: &str) -> Result<Option<Corporation>>;

    fn insert_corporation(&mut self, corporation: &Corporation) -> Result<()>;

    fn location_by_id(&self, id: Uuid) -> Result<Option<Location>>;

    /// Storage order of a stored location. Every multi-row lookup below
    /// returns its rows sorted by this position.
    fn location_position(&self, id: Uuid) -> Result<Option<i64>>;

    fn locations_by_store_id(&self, corporation_id: Uuid, store_id: &str)
        -> Result<Vec<Location>>;

    /// Match on (name, city, state) within a corporation; absent values only
    /// match absent values
    fn locations_by_site(
        &self,
        corporation_id: Uuid,
        name: Option<&str>,
        city: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<Location>>;

    fn insert_location(&mut self, location: &Location) -> Result<()>;

    fn update_location(&mut self, location: &Location) -> Result<()>;

    /// All locations in a (state, city, postal code) area, in storage order
    fn locations_in_area(
        &self,
        state: Option<&str>,
        city: Option<&str>,
        postal_code: Option<&str>,
    ) -> Result<Vec<Location>>;
}

// ============================================================================
// SHARED PREDICATES (in-memory side of the queries above)
// ============================================================================

pub(crate) fn matches_store_id(location: &Location, corporation_id: Uuid, store_id: &str) -> bool {
    location.corporation_id == corporation_id && location.store_id.as_deref() == Some(store_id)
}

pub(crate) fn matches_site(
    location: &Location,
    corporation_id: Uuid,
    name: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
) -> bool {
    location.corporation_id == corporation_id
        && location.name.as_deref() == name
        && location.city.as_deref() == city
        && location.state.as_deref() == state
}

pub(crate) fn in_area(
    location: &Location,
    state: Option<&str>,
    city: Option<&str>,
    postal_code: Option<&str>,
) -> bool {
    location.state.as_deref() == state
        && location.city.as_deref() == city
        && location.postal_code.as_deref() == postal_code
}
