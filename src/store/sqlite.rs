use super::RecordStore;
use crate::entities::{Corporation, CorporationKey, Country, Location};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

const CORPORATION_COLUMNS: &str = "id, legal_name, doing_business_as, website";

const LOCATION_COLUMNS: &str = "id, corporation_id, name, street_address, address_line_1,
    address_line_2, city, state, country, postal_code, store_id, lat, lon, h3_cell";

/// Durable record store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Open an existing database without writing to it: no schema setup,
    /// no journal mode change. Used by dry runs.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open database {} read-only", path.display()))?;
        Ok(SqliteStore { conn })
    }

    /// Store for a dry run: the database read-only when it exists, otherwise
    /// an empty in-memory store, so nothing is created on disk
    pub fn open_for_preview(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::open_read_only(path)
        } else {
            Self::open_in_memory()
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn corporation_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM corporations", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn location_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS corporations (
            id TEXT PRIMARY KEY,
            legal_name TEXT,
            doing_business_as TEXT,
            website TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            corporation_id TEXT NOT NULL REFERENCES corporations(id),
            name TEXT,
            street_address TEXT,
            address_line_1 TEXT,
            address_line_2 TEXT,
            city TEXT,
            state TEXT,
            country TEXT NOT NULL DEFAULT 'USA',
            postal_code TEXT,
            store_id TEXT,
            lat REAL,
            lon REAL,
            h3_cell TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_corporation_website ON corporations(website)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_corporation_dba ON corporations(doing_business_as)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_corporation_legal_name ON corporations(legal_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_location_store ON locations(corporation_id, store_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_location_site ON locations(corporation_id, name, city, state)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_location_area ON locations(state, city, postal_code)",
        [],
    )?;

    Ok(())
}

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_corporation(row: &Row) -> rusqlite::Result<Corporation> {
    Ok(Corporation {
        id: uuid_column(row, 0)?,
        legal_name: row.get(1)?,
        doing_business_as: row.get(2)?,
        website: row.get(3)?,
    })
}

fn row_to_location(row: &Row) -> rusqlite::Result<Location> {
    let country: String = row.get(8)?;

    Ok(Location {
        id: uuid_column(row, 0)?,
        corporation_id: uuid_column(row, 1)?,
        name: row.get(2)?,
        street_address: row.get(3)?,
        address_line_1: row.get(4)?,
        address_line_2: row.get(5)?,
        city: row.get(6)?,
        state: row.get(7)?,
        country: Country::parse(Some(country.as_str())),
        postal_code: row.get(9)?,
        store_id: row.get(10)?,
        lat: row.get(11)?,
        lon: row.get(12)?,
        h3_cell: row.get(13)?,
    })
}

impl RecordStore for SqliteStore {
    fn corporation_by_id(&self, id: Uuid) -> Result<Option<Corporation>> {
        let sql = format!("SELECT {CORPORATION_COLUMNS} FROM corporations WHERE id = ?1");
        let corporation = self
            .conn
            .query_row(&sql, [id.to_string()], row_to_corporation)
            .optional()?;
        Ok(corporation)
    }

    fn corporation_by_key(&self, key: CorporationKey, value: &str) -> Result<Option<Corporation>> {
        let sql = format!(
            "SELECT {CORPORATION_COLUMNS} FROM corporations
             WHERE {} = ?1
             ORDER BY rowid LIMIT 1",
            key.column()
        );
        let corporation = self
            .conn
            .query_row(&sql, [value], row_to_corporation)
            .optional()
            .with_context(|| format!("Failed to look up corporation by {key}"))?;
        Ok(corporation)
    }

    fn insert_corporation(&mut self, corporation: &Corporation) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO corporations (id, legal_name, doing_business_as, website, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    corporation.id.to_string(),
                    corporation.legal_name,
                    corporation.doing_business_as,
                    corporation.website,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to insert corporation {}", corporation.id))?;
        Ok(())
    }

    fn location_by_id(&self, id: Uuid) -> Result<Option<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1");
        let location = self
            .conn
            .query_row(&sql, [id.to_string()], row_to_location)
            .optional()?;
        Ok(location)
    }

    fn location_position(&self, id: Uuid) -> Result<Option<i64>> {
        let position = self
            .conn
            .query_row("SELECT rowid FROM locations WHERE id = ?1", [id.to_string()], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(position)
    }

    fn locations_by_store_id(
        &self,
        corporation_id: Uuid,
        store_id: &str,
    ) -> Result<Vec<Location>> {
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations
             WHERE corporation_id = ?1 AND store_id = ?2
             ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let locations = stmt
            .query_map(params![corporation_id.to_string(), store_id], row_to_location)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(locations)
    }

    fn locations_by_site(
        &self,
        corporation_id: Uuid,
        name: Option<&str>,
        city: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<Location>> {
        // `IS` so that NULL matches NULL
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations
             WHERE corporation_id = ?1 AND name IS ?2 AND city IS ?3 AND state IS ?4
             ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let locations = stmt
            .query_map(
                params![corporation_id.to_string(), name, city, state],
                row_to_location,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(locations)
    }

    fn insert_location(&mut self, location: &Location) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO locations (
                    id, corporation_id, name, street_address, address_line_1,
                    address_line_2, city, state, country, postal_code,
                    store_id, lat, lon, h3_cell, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                params![
                    location.id.to_string(),
                    location.corporation_id.to_string(),
                    location.name,
                    location.street_address,
                    location.address_line_1,
                    location.address_line_2,
                    location.city,
                    location.state,
                    location.country.code(),
                    location.postal_code,
                    location.store_id,
                    location.lat,
                    location.lon,
                    location.h3_cell,
                    now,
                ],
            )
            .with_context(|| format!("Failed to insert location {}", location.id))?;
        Ok(())
    }

    fn update_location(&mut self, location: &Location) -> Result<()> {
        self.conn
            .execute(
                "UPDATE locations
                 SET name = ?2, street_address = ?3, address_line_1 = ?4,
                     address_line_2 = ?5, city = ?6, state = ?7, country = ?8,
                     postal_code = ?9, store_id = ?10, lat = ?11, lon = ?12,
                     h3_cell = ?13, corporation_id = ?14, updated_at = ?15
                 WHERE id = ?1",
                params![
                    location.id.to_string(),
                    location.name,
                    location.street_address,
                    location.address_line_1,
                    location.address_line_2,
                    location.city,
                    location.state,
                    location.country.code(),
                    location.postal_code,
                    location.store_id,
                    location.lat,
                    location.lon,
                    location.h3_cell,
                    location.corporation_id.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to update location {}", location.id))?;
        Ok(())
    }

    fn locations_in_area(
        &self,
        state: Option<&str>,
        city: Option<&str>,
        postal_code: Option<&str>,
    ) -> Result<Vec<Location>> {
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations
             WHERE state IS ?1 AND city IS ?2 AND postal_code IS ?3
             ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let locations = stmt
            .query_map(params![state, city, postal_code], row_to_location)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(locations)
    }
}
