use std::sync::Arc;
use std::thread;

use matchcity_core::storage::{
    LocalStore, NewActivity, NewVenue, RowFilter, SqliteStore, Table, SCHEMA_VERSION,
};
use rusqlite::Connection;
use tempfile::tempdir;

fn venue(id: &str, name: &str) -> NewVenue {
    NewVenue {
        venue_id: id.to_string(),
        name: name.to_string(),
        address: "Silbury Boulevard".to_string(),
        postcode: "MK9 3AZ".to_string(),
        latitude: 52.04,
        longitude: -0.75,
        web: "https://centre.example".to_string(),
        email: "info@centre.example".to_string(),
        telephone: "01908 000001".to_string(),
    }
}

#[test]
fn test_store_persists_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("matchcity.db");

    {
        let store = SqliteStore::open(&path).expect("open should succeed");
        store
            .upsert_record(&venue("v1", "Centre MK"))
            .expect("upsert should succeed");
        assert_eq!(store.path(), Some(path.as_path()));
    }

    let store = SqliteStore::open(&path).expect("reopen should succeed");
    let venues = store.venues().expect("query should succeed");
    assert_eq!(venues.len(), 1);
    assert_eq!(venues[0].name, "Centre MK");
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_schema_version_change_wipes_store() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("matchcity.db");

    {
        let store = SqliteStore::open(&path).expect("open should succeed");
        store.upsert_record(&venue("v1", "Centre MK")).unwrap();
    }

    {
        let conn = Connection::open(&path).expect("raw open");
        conn.execute_batch("PRAGMA user_version = 1;")
            .expect("set old version");
    }

    let store = SqliteStore::open(&path).expect("reopen should succeed");
    assert_eq!(store.count(Table::Venues, &RowFilter::all()).unwrap(), 0);
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_legacy_table_without_unique_key_is_replaced() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("matchcity.db");

    {
        let conn = Connection::open(&path).expect("raw open");
        conn.execute_batch(
            r#"
            CREATE TABLE venues (_id integer primary key autoincrement, venue_id TEXT, name TEXT);
            INSERT INTO venues (venue_id, name) VALUES ('v1', 'Old'), ('v1', 'Older');
            PRAGMA user_version = 1;
            "#,
        )
        .expect("legacy schema");
    }

    let store = SqliteStore::open(&path).expect("open should succeed");
    store.upsert_record(&venue("v1", "New")).unwrap();
    store.upsert_record(&venue("v1", "Newer")).unwrap();

    let venues = store.venues().unwrap();
    assert_eq!(venues.len(), 1);
    assert_eq!(venues[0].name, "Newer");
    assert!(store.check_integrity().unwrap().is_ok());
}

#[test]
fn test_concurrent_upserts_leave_one_row_per_key() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("matchcity.db");
    let store = Arc::new(SqliteStore::open(&path).expect("open should succeed"));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 0..25 {
                    store
                        .upsert_record(&NewActivity {
                            activity_id: format!("a{}", round % 5),
                            title: format!("Title from worker {}", worker),
                            category: "Team".to_string(),
                        })
                        .expect("upsert should succeed");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker should not panic");
    }

    assert_eq!(store.count(Table::Activities, &RowFilter::all()).unwrap(), 5);
    assert!(store.check_integrity().unwrap().duplicate_keys.is_empty());
}

#[test]
fn test_two_connections_share_one_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("matchcity.db");
    let writer = SqliteStore::open(&path).expect("open writer");
    let reader = SqliteStore::open(&path).expect("open reader");

    writer.upsert_record(&venue("v1", "Pool")).unwrap();
    writer.upsert_record(&venue("v1", "Pool & Gym")).unwrap();

    let seen = reader.find_venue("v1").unwrap().expect("row visible to reader");
    assert_eq!(seen.name, "Pool & Gym");
    assert_eq!(reader.count(Table::Venues, &RowFilter::all()).unwrap(), 1);
}
