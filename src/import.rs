// 📥 Import Pipeline - corporations first, then locations
//
// Corporations are fully processed (filling the external-id cache) before
// the first location row, because location rows reference corporations by
// their external id. A dry run executes the exact same code against a
// StagedStore, so its counters are those of a real run.

use crate::config::ImportOptions;
use crate::diff::reconcile;
use crate::entities::{Corporation, LOCATION_FIELDS};
use crate::error::ImportError;
use crate::parser::{
    parse_id, read_corporation_rows, read_location_rows, CorporationRow, LocationRow,
};
use crate::resolver::{
    corporation_lookups, find_existing_location, resolve_corporation, resolve_location_owner,
    ExternalIdCache, Resolved,
};
use crate::store::{RecordStore, StagedStore};
use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// RUN COUNTERS
// ============================================================================

/// Per-run counters. "Updated" counts rows whose diff found a change, which
/// in a dry run means "would update".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub created_corporations: usize,
    pub updated_corporations: usize,
    pub created_locations: usize,
    pub updated_locations: usize,
}

impl RunCounters {
    /// Completion line printed at the end of a run
    pub fn summary(&self, dry_run: bool) -> String {
        if dry_run {
            format!("[dry-run] Done (nothing written). {self}")
        } else {
            format!("Done. {self}")
        }
    }
}

impl fmt::Display for RunCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Corporations: +{} created, ~{} updated. Locations: +{} created, ~{} updated.",
            self.created_corporations,
            self.updated_corporations,
            self.created_locations,
            self.updated_locations
        )
    }
}

// ============================================================================
// IMPORT RUN
// ============================================================================

/// State of one import invocation: the store it writes to, its options, the
/// external-id cache and the counters. Dropped at the end of the run.
pub struct ImportRun<'s, S: RecordStore> {
    store: &'s mut S,
    options: ImportOptions,
    cache: ExternalIdCache,
    counters: RunCounters,
}

impl<'s, S: RecordStore> ImportRun<'s, S> {
    pub fn new(store: &'s mut S, options: ImportOptions) -> Self {
        ImportRun {
            store,
            options,
            cache: ExternalIdCache::new(),
            counters: RunCounters::default(),
        }
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn cache(&self) -> &ExternalIdCache {
        &self.cache
    }

    pub fn load_corporations(&mut self, rows: &[CorporationRow]) -> Result<()> {
        info!(rows = rows.len(), "Loading corporations");

        for row in rows {
            let Some(raw_id) = row.corporation_id.as_deref() else {
                warn!(line = row.line, "Skipping corporation row with missing ID");
                continue;
            };
            let Some(external_id) = parse_id(Some(raw_id)) else {
                warn!(line = row.line, corporation_id = raw_id, "Skipping corporation row with invalid ID");
                continue;
            };

            let lookups = corporation_lookups(
                row.website.as_deref(),
                row.doing_business_as.as_deref(),
                row.legal_name.as_deref(),
            );

            let corporation = match resolve_corporation(&*self.store, &lookups)? {
                Some(Resolved { entity, matched_by }) => {
                    debug!(line = row.line, corporation_id = %entity.id, %matched_by, "Corporation matched");
                    entity
                }
                None => {
                    let candidate = Corporation::new(
                        external_id,
                        row.legal_name.clone(),
                        row.doing_business_as.clone(),
                        row.website.clone(),
                    );
                    if candidate.is_anonymous() && !self.options.create_missing_corporations {
                        warn!(
                            line = row.line,
                            corporation_id = raw_id,
                            "Skipping corporation row without website, DBA or legal name"
                        );
                        continue;
                    }
                    self.create_corporation(candidate)?
                }
            };

            self.cache.insert(external_id, corporation);
        }

        Ok(())
    }

    pub fn load_locations(&mut self, rows: &[LocationRow]) -> Result<()> {
        info!(rows = rows.len(), cached_corporations = self.cache.len(), "Loading locations");

        for row in rows {
            let name = row.name.as_deref().unwrap_or_default();

            let Some(raw_id) = row.id.as_deref() else {
                warn!(line = row.line, name, "Skipping location row with missing ID");
                continue;
            };
            let Some(id) = parse_id(Some(raw_id)) else {
                warn!(line = row.line, location_id = raw_id, "Skipping location row with invalid ID");
                continue;
            };

            let external_id = row.corporation_id.as_deref().and_then(|raw| {
                let parsed = parse_id(Some(raw));
                if parsed.is_none() {
                    warn!(line = row.line, corporation_id = raw, "Ignoring invalid corporation_id on location row");
                }
                parsed
            });

            let owner = match resolve_location_owner(&*self.store, &self.cache, external_id, row)? {
                Some(Resolved { entity, matched_by }) => {
                    debug!(line = row.line, corporation_id = %entity.id, %matched_by, "Location owner resolved");
                    entity
                }
                None if self.options.create_missing_corporations => {
                    self.create_missing_owner(external_id, row)?
                }
                None => {
                    warn!(
                        line = row.line,
                        location_id = %id,
                        name,
                        "Skipping location without resolvable corporation"
                    );
                    continue;
                }
            };

            let incoming = row.to_location(id, owner.id);

            match find_existing_location(&*self.store, owner.id, id, row)? {
                None => {
                    self.store.insert_location(&incoming)?;
                    self.counters.created_locations += 1;
                }
                Some(Resolved { entity: mut existing, matched_by }) => {
                    let mut changed = reconcile(&mut existing, &incoming, &LOCATION_FIELDS);
                    // only a stored-id match can point at another owner
                    if existing.corporation_id != owner.id {
                        existing.corporation_id = owner.id;
                        changed.push("corporation_id");
                    }
                    if changed.is_empty() {
                        continue;
                    }
                    debug!(
                        line = row.line,
                        location_id = %existing.id,
                        %matched_by,
                        fields = ?changed,
                        "Location changed"
                    );
                    self.store.update_location(&existing)?;
                    self.counters.updated_locations += 1;
                }
            }
        }

        Ok(())
    }

    /// Store `candidate`, unless a corporation already holds its id, in which
    /// case that one is reused and nothing is counted.
    fn create_corporation(&mut self, candidate: Corporation) -> Result<Corporation> {
        if let Some(existing) = self.store.corporation_by_id(candidate.id)? {
            debug!(corporation_id = %existing.id, "Corporation id already stored, reusing it");
            return Ok(existing);
        }

        self.store.insert_corporation(&candidate)?;
        self.counters.created_corporations += 1;
        Ok(candidate)
    }

    fn create_missing_owner(
        &mut self,
        external_id: Option<Uuid>,
        row: &LocationRow,
    ) -> Result<Corporation> {
        let candidate = Corporation::new(
            external_id.unwrap_or_else(Uuid::new_v4),
            None,
            row.doing_business_as.clone().or_else(|| row.name.clone()),
            row.website.clone(),
        );
        debug!(line = row.line, corporation = candidate.display_name(), "Creating missing corporation");

        let corporation = self.create_corporation(candidate)?;
        if let Some(external_id) = external_id {
            self.cache.insert(external_id, corporation.clone());
        }
        Ok(corporation)
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Run the pipeline over already-parsed rows.
///
/// With `dry_run` every write lands in a [`StagedStore`] that is dropped at
/// the end, leaving `store` untouched.
pub fn import_rows<S: RecordStore>(
    store: &mut S,
    corporations: &[CorporationRow],
    locations: &[LocationRow],
    options: ImportOptions,
) -> Result<RunCounters> {
    if options.dry_run {
        let mut staged = StagedStore::new(&*store);
        let counters = process(&mut staged, corporations, locations, options)?;
        info!(suppressed_writes = staged.pending_writes(), "Dry run, nothing persisted");
        return Ok(counters);
    }
    process(store, corporations, locations, options)
}

fn process<S: RecordStore>(
    store: &mut S,
    corporations: &[CorporationRow],
    locations: &[LocationRow],
    options: ImportOptions,
) -> Result<RunCounters> {
    let mut run = ImportRun::new(store, options);
    run.load_corporations(corporations)?;
    run.load_locations(locations)?;
    Ok(run.counters())
}

/// Import from CSV files.
///
/// A missing locations source fails before anything is read. A missing
/// corporations source is a degraded run: locations can then only be matched
/// by website, DBA or name.
pub fn run_import<S: RecordStore>(
    store: &mut S,
    corporations: Option<&Path>,
    locations: Option<&Path>,
    options: ImportOptions,
) -> Result<RunCounters> {
    let locations = match locations {
        Some(path) if path.exists() => path,
        Some(path) => return Err(ImportError::MissingLocations(path.to_path_buf()).into()),
        None => return Err(ImportError::NoLocationsSource.into()),
    };

    let corporation_rows = match corporations {
        Some(path) if path.exists() => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_corporation_rows(file)
                .with_context(|| format!("Failed to load corporations from {}", path.display()))?
        }
        Some(path) => {
            warn!(
                path = %path.display(),
                "Corporations CSV not found (continuing; will only load locations)"
            );
            Vec::new()
        }
        None => {
            warn!("No corporations CSV given (continuing; will only load locations)");
            Vec::new()
        }
    };

    let file = File::open(locations)
        .with_context(|| format!("Failed to open {}", locations.display()))?;
    let location_rows = read_location_rows(file)
        .with_context(|| format!("Failed to load locations from {}", locations.display()))?;

    import_rows(store, &corporation_rows, &location_rows, options)
}
