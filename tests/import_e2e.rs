// Import from CSV files on disk into a file-backed store

use location_resolver::{
    run_import, Corporation, ImportError, ImportOptions, RecordStore, SqliteStore,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

const WALGREENS: &str = "8eec1cf5-856a-48d5-80f7-1251a86a427e";
const DOWNTOWN: &str = "4b22ad83-85d6-3144-898b-d27040118adc";

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let corporations = write(
        dir,
        "corporations.csv",
        &format!(
            "corporation_id,legal_name,doing_business_as,website\n\
             {WALGREENS},Walgreen Co.,Walgreens,walgreens.test\n"
        ),
    );
    let locations = write(
        dir,
        "locations.csv",
        &format!(
            "id,corporation_id,name,street_address,city,state,country,postal_code,store_id,lat,lon\n\
             {DOWNTOWN},{WALGREENS},Walgreens,100 Congress Ave,Austin,TX,USA,78701,S1,30.2672,-97.7431\n\
             ,{WALGREENS},Walgreens,200 Congress Ave,Austin,TX,USA,78701,S2,,\n"
        ),
    );
    (corporations, locations)
}

#[test]
fn test_load_and_reload_from_disk() {
    let dir = TempDir::new().unwrap();
    let (corporations, locations) = fixtures(dir.path());
    let db = dir.path().join("data").join("locations.db");

    let mut store = SqliteStore::open(&db).unwrap();
    let first = run_import(&mut store, Some(corporations.as_path()), Some(locations.as_path()), ImportOptions::default())
        .unwrap();

    // the second location row has no id and is skipped
    assert_eq!(first.created_corporations, 1);
    assert_eq!(first.created_locations, 1);

    let location = store
        .location_by_id(Uuid::parse_str(DOWNTOWN).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(location.corporation_id, Uuid::parse_str(WALGREENS).unwrap());
    assert_eq!(location.postal_code.as_deref(), Some("78701"));
    drop(store);

    // reopen: nothing left to do
    let mut store = SqliteStore::open(&db).unwrap();
    let second = run_import(&mut store, Some(corporations.as_path()), Some(locations.as_path()), ImportOptions::default())
        .unwrap();
    assert_eq!(second.to_string(), "Corporations: +0 created, ~0 updated. Locations: +0 created, ~0 updated.");
}

#[test]
fn test_dry_run_leaves_database_empty() {
    let dir = TempDir::new().unwrap();
    let (corporations, locations) = fixtures(dir.path());
    let mut store = SqliteStore::open(&dir.path().join("locations.db")).unwrap();

    let options = ImportOptions { dry_run: true, ..ImportOptions::default() };
    let counters = run_import(&mut store, Some(corporations.as_path()), Some(locations.as_path()), options).unwrap();

    assert_eq!(counters.created_corporations, 1);
    assert_eq!(counters.created_locations, 1);
    assert_eq!(store.corporation_count().unwrap(), 0);
    assert_eq!(store.location_count().unwrap(), 0);
}

#[test]
fn test_missing_locations_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let (corporations, _) = fixtures(dir.path());
    let mut store = SqliteStore::open_in_memory().unwrap();

    let missing = dir.path().join("nope.csv");
    let err = run_import(&mut store, Some(corporations.as_path()), Some(missing.as_path()), ImportOptions::default())
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<ImportError>(), Some(ImportError::MissingLocations(_))));
    assert_eq!(store.corporation_count().unwrap(), 0);
}

#[test]
fn test_missing_corporations_file_degrades() {
    let dir = TempDir::new().unwrap();
    let (_, locations) = fixtures(dir.path());
    let mut store = SqliteStore::open_in_memory().unwrap();

    // without the corporations file the owner can only be found by name
    let counters = run_import(
        &mut store,
        Some(dir.path().join("absent.csv").as_path()),
        Some(locations.as_path()),
        ImportOptions::default(),
    )
    .unwrap();
    assert_eq!(counters.created_locations, 0);

    let options = ImportOptions { create_missing_corporations: true, ..ImportOptions::default() };
    let counters = run_import(&mut store, None, Some(locations.as_path()), options).unwrap();
    assert_eq!(counters.created_corporations, 1);
    assert_eq!(counters.created_locations, 1);
}

#[test]
fn test_missing_required_column_is_fatal() {
    let dir = TempDir::new().unwrap();
    let locations = write(dir.path(), "locations.csv", "id,name,city,country\n");
    let mut store = SqliteStore::open_in_memory().unwrap();

    let err = run_import(&mut store, None, Some(locations.as_path()), ImportOptions::default()).unwrap_err();
    let kind = err.downcast_ref::<ImportError>();

    match kind {
        Some(ImportError::MissingColumns { columns, .. }) => assert_eq!(columns, &vec!["state".to_string()]),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_preview_store_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let (corporations, locations) = fixtures(dir.path());
    let options = ImportOptions { dry_run: true, ..ImportOptions::default() };

    // no database yet: the preview runs in memory and creates nothing
    let db = dir.path().join("data").join("locations.db");
    let mut store = SqliteStore::open_for_preview(&db).unwrap();
    let counters = run_import(&mut store, Some(corporations.as_path()), Some(locations.as_path()), options)
        .unwrap();
    assert_eq!(counters.created_locations, 1);
    assert!(!db.exists());
    assert!(!dir.path().join("data").exists());

    // existing database: opened read-only, reads work and writes are refused
    let mut seeded = SqliteStore::open(&db).unwrap();
    run_import(&mut seeded, Some(corporations.as_path()), Some(locations.as_path()), ImportOptions::default())
        .unwrap();
    drop(seeded);

    let mut preview = SqliteStore::open_for_preview(&db).unwrap();
    let counters = run_import(&mut preview, Some(corporations.as_path()), Some(locations.as_path()), options)
        .unwrap();
    assert_eq!(counters.created_corporations, 0);
    assert_eq!(counters.created_locations, 0);

    let stranger = Corporation::new(Uuid::new_v4(), Some("Stranger LLC".to_string()), None, None);
    assert!(preview.insert_corporation(&stranger).is_err());
    assert_eq!(preview.corporation_count().unwrap(), 1);
}
