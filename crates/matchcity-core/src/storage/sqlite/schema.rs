//! Table definitions and the lossy schema upgrade.
//!
//! The store is a cache of remote data, so an upgrade drops every table and
//! recreates it instead of migrating rows.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::Result;
use crate::storage::types::Table;

/// Bumping this wipes every existing store on next open.
pub const SCHEMA_VERSION: i32 = 2;

const CREATE_TABLES: &str = r#"
    CREATE TABLE venues (
        _id INTEGER PRIMARY KEY AUTOINCREMENT,
        venue_id TEXT NOT NULL UNIQUE,
        name TEXT,
        updated INTEGER,
        latitude REAL,
        longitude REAL,
        telephone TEXT,
        address TEXT,
        postcode TEXT,
        web TEXT,
        email TEXT
    );

    CREATE TABLE activities (
        _id INTEGER PRIMARY KEY AUTOINCREMENT,
        activity_id TEXT NOT NULL UNIQUE,
        title TEXT,
        category TEXT
    );

    CREATE TABLE sub_activities (
        _id INTEGER PRIMARY KEY AUTOINCREMENT,
        sub_activity_id TEXT NOT NULL UNIQUE,
        title TEXT,
        activity_id TEXT
    );

    CREATE INDEX sub_activities_activity_id ON sub_activities (activity_id);
"#;

pub fn stored_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Bring the schema to [`SCHEMA_VERSION`], destroying data on a version change.
pub fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let version = stored_version(conn)?;
    if version == SCHEMA_VERSION {
        return Ok(());
    }

    if version == 0 {
        info!(version = SCHEMA_VERSION, "Creating store schema");
    } else {
        warn!(
            from = version,
            to = SCHEMA_VERSION,
            "Upgrading store schema, which will destroy all old data"
        );
    }
    recreate(conn)
}

/// Drop and recreate every table.
pub fn recreate(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    for table in Table::ALL {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", table.name()))?;
    }
    tx.execute_batch(CREATE_TABLES)?;
    // PRAGMA does not take bound parameters; the value is a compile-time constant.
    tx.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_gets_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(stored_version(&conn).unwrap(), 0);
        ensure_schema(&mut conn).unwrap();
        assert_eq!(stored_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_version_change_drops_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_schema(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO activities (activity_id, title, category) VALUES ('a1', 'Swim', 'Water')",
            [],
        )
        .unwrap();
        conn.execute_batch("PRAGMA user_version = 1;").unwrap();

        ensure_schema(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(stored_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_current_version_keeps_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_schema(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO activities (activity_id, title, category) VALUES ('a1', 'Swim', 'Water')",
            [],
        )
        .unwrap();

        ensure_schema(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
