use super::{in_area, matches_site, matches_store_id, RecordStore};
use crate::entities::{Corporation, CorporationKey, Location};
use anyhow::Result;
use uuid::Uuid;

/// A pending location write. `position` is the base row's storage position
/// for updates and None for inserts, which sort after every stored row.
#[derive(Debug, Clone)]
struct StagedLocation {
    position: Option<i64>,
    location: Location,
}

/// Write overlay over a read-only store.
///
/// Inserts and updates are kept in memory and never reach `base`. Reads see
/// the base store with pending writes applied, in the base store's order, so
/// a dry run resolves every row exactly as a real run would.
pub struct StagedStore<'a, S: RecordStore> {
    base: &'a S,
    corporations: Vec<Corporation>,
    locations: Vec<StagedLocation>,
}

impl<'a, S: RecordStore> StagedStore<'a, S> {
    pub fn new(base: &'a S) -> Self {
        StagedStore {
            base,
            corporations: Vec::new(),
            locations: Vec::new(),
        }
    }

    /// Number of entities that would have been written
    pub fn pending_writes(&self) -> usize {
        self.corporations.len() + self.locations.len()
    }

    fn staged_location(&self, id: Uuid) -> Option<&Location> {
        self.locations
            .iter()
            .find(|staged| staged.location.id == id)
            .map(|staged| &staged.location)
    }

    /// Apply pending writes to the base candidates of a lookup.
    ///
    /// Staged versions replace their base rows and are kept only if they
    /// still satisfy `pred`; staged rows that now satisfy it join the list.
    /// The result is ordered by storage position, inserts last in the order
    /// they were staged.
    fn overlay<F>(&self, base_hits: Vec<Location>, pred: F) -> Result<Vec<Location>>
    where
        F: Fn(&Location) -> bool,
    {
        let mut found: Vec<(Option<i64>, Location)> = Vec::new();

        for hit in base_hits {
            if self.staged_location(hit.id).is_some() {
                continue;
            }
            found.push((self.base.location_position(hit.id)?, hit));
        }
        for staged in &self.locations {
            if pred(&staged.location) {
                found.push((staged.position, staged.location.clone()));
            }
        }

        // stable: inserts keep their staging order
        found.sort_by_key(|(position, _)| (position.is_none(), *position));
        Ok(found.into_iter().map(|(_, location)| location).collect())
    }
}

impl<'a, S: RecordStore> RecordStore for StagedStore<'a, S> {
    fn corporation_by_id(&self, id: Uuid) -> Result<Option<Corporation>> {
        if let Some(staged) = self.corporations.iter().find(|c| c.id == id) {
            return Ok(Some(staged.clone()));
        }
        self.base.corporation_by_id(id)
    }

    fn corporation_by_key(&self, key: CorporationKey, value: &str) -> Result<Option<Corporation>> {
        // Corporations are insert-only, so stored rows always precede staged ones
        if let Some(hit) = self.base.corporation_by_key(key, value)? {
            return Ok(Some(hit));
        }
        Ok(self
            .corporations
            .iter()
            .find(|c| key.value_of(c) == Some(value))
            .cloned())
    }

    fn insert_corporation(&mut self, corporation: &Corporation) -> Result<()> {
        self.corporations.push(corporation.clone());
        Ok(())
    }

    fn location_by_id(&self, id: Uuid) -> Result<Option<Location>> {
        if let Some(staged) = self.staged_location(id) {
            return Ok(Some(staged.clone()));
        }
        self.base.location_by_id(id)
    }

    fn location_position(&self, id: Uuid) -> Result<Option<i64>> {
        match self.locations.iter().find(|staged| staged.location.id == id) {
            Some(staged) => Ok(staged.position),
            None => self.base.location_position(id),
        }
    }

    fn locations_by_store_id(
        &self,
        corporation_id: Uuid,
        store_id: &str,
    ) -> Result<Vec<Location>> {
        let base_hits = self.base.locations_by_store_id(corporation_id, store_id)?;
        self.overlay(base_hits, |l| matches_store_id(l, corporation_id, store_id))
    }

    fn locations_by_site(
        &self,
        corporation_id: Uuid,
        name: Option<&str>,
        city: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<Location>> {
        let base_hits = self.base.locations_by_site(corporation_id, name, city, state)?;
        self.overlay(base_hits, |l| matches_site(l, corporation_id, name, city, state))
    }

    fn insert_location(&mut self, location: &Location) -> Result<()> {
        self.locations.push(StagedLocation {
            position: None,
            location: location.clone(),
        });
        Ok(())
    }

    fn update_location(&mut self, location: &Location) -> Result<()> {
        if let Some(staged) = self.locations.iter_mut().find(|s| s.location.id == location.id) {
            staged.location = location.clone();
            return Ok(());
        }
        let position = self.base.location_position(location.id)?;
        self.locations.push(StagedLocation {
            position,
            location: location.clone(),
        });
        Ok(())
    }

    fn locations_in_area(
        &self,
        state: Option<&str>,
        city: Option<&str>,
        postal_code: Option<&str>,
    ) -> Result<Vec<Location>> {
        let base_hits = self.base.locations_in_area(state, city, postal_code)?;
        self.overlay(base_hits, |l| in_area(l, state, city, postal_code))
    }
}
