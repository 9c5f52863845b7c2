// 🔍 Entity Resolution - decide whether an incoming row is a known entity
//
// Corporations are matched through an ordered list of lookups, first hit
// wins. Locations are matched within their resolved corporation.

use crate::entities::{Corporation, CorporationKey, Location};
use crate::parser::LocationRow;
use crate::store::RecordStore;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// KEY LOOKUPS
// ============================================================================

/// One step of a corporation matching chain: look up `value` under `key`.
/// A lookup with no value is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLookup<'r> {
    pub key: CorporationKey,
    pub value: Option<&'r str>,
}

impl<'r> KeyLookup<'r> {
    pub fn new(key: CorporationKey, value: Option<&'r str>) -> Self {
        KeyLookup { key, value }
    }
}

/// How an entity was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// Corporation resolved earlier in this run under the row's external id
    ExternalId,
    /// Alternate key lookup
    Key(CorporationKey),
    /// Location matched on (store id, corporation)
    StoreId,
    /// Location matched on (name, city, state, corporation)
    Site,
    /// Entity already stored under the row's identifier
    StoredId,
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSource::ExternalId => f.write_str("external id"),
            MatchSource::Key(key) => write!(f, "{key}"),
            MatchSource::StoreId => f.write_str("store id"),
            MatchSource::Site => f.write_str("name/city/state"),
            MatchSource::StoredId => f.write_str("stored id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub entity: T,
    pub matched_by: MatchSource,
}

/// Lookups for a corporation row: website, then DBA, then legal name
pub fn corporation_lookups<'r>(
    website: Option<&'r str>,
    doing_business_as: Option<&'r str>,
    legal_name: Option<&'r str>,
) -> [KeyLookup<'r>; 3] {
    [
        KeyLookup::new(CorporationKey::Website, website),
        KeyLookup::new(CorporationKey::DoingBusinessAs, doing_business_as),
        KeyLookup::new(CorporationKey::LegalName, legal_name),
    ]
}

/// Lookups for the owner of a location row. The location's own name doubles
/// as a DBA candidate and then a legal-name candidate.
pub fn location_owner_lookups(row: &LocationRow) -> [KeyLookup<'_>; 4] {
    let name = row.name.as_deref();
    [
        KeyLookup::new(CorporationKey::Website, row.website.as_deref()),
        KeyLookup::new(CorporationKey::DoingBusinessAs, row.doing_business_as.as_deref()),
        KeyLookup::new(CorporationKey::DoingBusinessAs, name),
        KeyLookup::new(CorporationKey::LegalName, name),
    ]
}

/// Evaluate `lookups` in order and return the first stored match
pub fn resolve_corporation<S: RecordStore>(
    store: &S,
    lookups: &[KeyLookup<'_>],
) -> Result<Option<Resolved<Corporation>>> {
    for lookup in lookups {
        let Some(value) = lookup.value else { continue };
        if let Some(corporation) = store.corporation_by_key(lookup.key, value)? {
            return Ok(Some(Resolved {
                entity: corporation,
                matched_by: MatchSource::Key(lookup.key),
            }));
        }
    }
    Ok(None)
}

// ============================================================================
// EXTERNAL ID CACHE
// ============================================================================

/// Corporations resolved during one import run, keyed by the external id
/// used in the source files. Lives exactly as long as the run.
#[derive(Debug, Default)]
pub struct ExternalIdCache {
    entries: HashMap<Uuid, Corporation>,
}

impl ExternalIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, external_id: Uuid, corporation: Corporation) {
        self.entries.insert(external_id, corporation);
    }

    pub fn get(&self, external_id: &Uuid) -> Option<&Corporation> {
        self.entries.get(external_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the corporation owning a location row: the external-id cache
/// first, then the store lookups from [`location_owner_lookups`].
pub fn resolve_location_owner<S: RecordStore>(
    store: &S,
    cache: &ExternalIdCache,
    external_id: Option<Uuid>,
    row: &LocationRow,
) -> Result<Option<Resolved<Corporation>>> {
    if let Some(corporation) = external_id.and_then(|id| cache.get(&id)) {
        return Ok(Some(Resolved {
            entity: corporation.clone(),
            matched_by: MatchSource::ExternalId,
        }));
    }
    resolve_corporation(store, &location_owner_lookups(row))
}

// ============================================================================
// LOCATION MATCHING
// ============================================================================

/// Find the stored location an incoming row refers to, within `owner`.
///
/// Store id first (when the row has one), then (name, city, state), then a
/// location already stored under the row's id. The first candidate in
/// storage order wins at each step.
pub fn find_existing_location<S: RecordStore>(
    store: &S,
    owner: Uuid,
    id: Uuid,
    row: &LocationRow,
) -> Result<Option<Resolved<Location>>> {
    if let Some(store_id) = row.store_id.as_deref() {
        if let Some(location) = store.locations_by_store_id(owner, store_id)?.into_iter().next() {
            return Ok(Some(Resolved { entity: location, matched_by: MatchSource::StoreId }));
        }
    }

    let site = store
        .locations_by_site(owner, row.name.as_deref(), row.city.as_deref(), row.state.as_deref())?
        .into_iter()
        .next();
    if let Some(location) = site {
        return Ok(Some(Resolved { entity: location, matched_by: MatchSource::Site }));
    }

    // A row whose keys changed since the last run would otherwise be
    // inserted again under an id that is already taken.
    Ok(store
        .location_by_id(id)?
        .map(|location| Resolved { entity: location, matched_by: MatchSource::StoredId }))
}
