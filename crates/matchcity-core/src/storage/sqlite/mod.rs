//! SQLite storage backend.
//!
//! One connection behind a mutex. Every statement is prepared with bound
//! parameters; identifiers are only ever taken from the fixed column lists
//! in [`Table`], after validation.

mod row;
pub mod schema;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{MatchCityError, Result};
use crate::storage::notify::ChangeNotifier;
use crate::storage::traits::LocalStore;
use crate::storage::types::{
    ChangeEvent, ChangeKind, Condition, FieldValue, IntegrityReport, Record, RowFilter,
    SortOrder, Table, UpsertOutcome, Values, KEY_ID, KEY_UPDATED,
};

pub use schema::SCHEMA_VERSION;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed local store.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
}

impl SqliteStore {
    /// Open (or create) the store at `path`, upgrading the schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::ensure_schema(&mut conn)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Location on disk, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.lock_conn()?;
        schema::stored_version(&conn)
    }

    /// Drop and recreate every table.
    pub fn reset(&self) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let mut removed = Vec::new();
        for table in Table::ALL {
            removed.push((table, Self::count_rows(&conn, table, &RowFilter::all())?));
        }
        schema::recreate(&mut conn)?;
        drop(conn);

        for (table, count) in removed {
            self.notifier.publish(ChangeEvent {
                table,
                kind: ChangeKind::Deleted,
                row_id: None,
                count,
            });
        }
        Ok(())
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MatchCityError::Storage("SQLite connection poisoned".to_string()))
    }

    fn select_list(table: Table) -> String {
        let mut columns = vec![KEY_ID];
        columns.extend_from_slice(table.columns());
        columns.join(", ")
    }

    fn where_clause(table: Table, filter: &RowFilter) -> Result<(String, Vec<FieldValue>)> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<FieldValue> = Vec::new();

        for condition in &filter.conditions {
            match condition {
                Condition::Eq(column, FieldValue::Null) => {
                    table.check_column(column)?;
                    conditions.push(format!("{} IS NULL", column));
                }
                Condition::Eq(column, value) => {
                    table.check_column(column)?;
                    conditions.push(format!("{} = ?", column));
                    params.push(value.clone());
                }
                Condition::Like(column, pattern) => {
                    table.check_column(column)?;
                    conditions.push(format!("{} LIKE ?", column));
                    params.push(FieldValue::Text(pattern.clone()));
                }
                Condition::RowId(row_id) => {
                    conditions.push(format!("{} = ?", KEY_ID));
                    params.push(FieldValue::Integer(*row_id));
                }
            }
        }

        if conditions.is_empty() {
            Ok((String::new(), params))
        } else {
            Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
        }
    }

    fn count_rows(conn: &Connection, table: Table, filter: &RowFilter) -> Result<usize> {
        let (where_sql, params) = Self::where_clause(table, filter)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", table.name(), where_sql);
        let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn duplicate_keys(conn: &Connection, table: Table) -> Result<Vec<(Table, String)>> {
        let key = table.natural_key();
        let sql = format!(
            "SELECT {key} FROM {} GROUP BY {key} HAVING COUNT(*) > 1 ORDER BY {key}",
            table.name()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut duplicates = Vec::new();
        for row in rows {
            duplicates.push((table, row?));
        }
        Ok(duplicates)
    }
}

impl LocalStore for SqliteStore {
    fn insert(&self, table: Table, values: &Values) -> Result<i64> {
        values.validate(table)?;
        let conn = self.lock_conn()?;

        let columns: Vec<&str> = values.iter().map(|(column, _)| column).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            columns.join(", "),
            placeholders
        );
        conn.execute(&sql, params_from_iter(values.iter().map(|(_, value)| value)))?;
        let row_id = conn.last_insert_rowid();
        drop(conn);

        self.notifier.publish(ChangeEvent {
            table,
            kind: ChangeKind::Inserted,
            row_id: Some(row_id),
            count: 1,
        });
        Ok(row_id)
    }

    fn query(
        &self,
        table: Table,
        filter: &RowFilter,
        sort: Option<&SortOrder>,
    ) -> Result<Vec<Record>> {
        let sort = match sort {
            Some(order) => {
                table.check_column(&order.column)?;
                order.clone()
            }
            None => SortOrder::ascending(table.default_sort()),
        };
        let (where_sql, params) = Self::where_clause(table, filter)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} {}, {}",
            Self::select_list(table),
            table.name(),
            where_sql,
            sort.column,
            if sort.descending { "DESC" } else { "ASC" },
            KEY_ID
        );

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns = table.columns();
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let row_id: i64 = row.get(0)?;
            let mut fields = BTreeMap::new();
            for (index, column) in columns.iter().enumerate() {
                fields.insert(column.to_string(), row.get::<_, FieldValue>(index + 1)?);
            }
            Ok(Record { row_id, fields })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn update(&self, table: Table, filter: &RowFilter, values: &Values) -> Result<usize> {
        values.validate(table)?;
        let (where_sql, filter_params) = Self::where_clause(table, filter)?;

        let assignments: Vec<String> = values
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            table.name(),
            assignments.join(", "),
            where_sql
        );
        let params = values
            .iter()
            .map(|(_, value)| value)
            .chain(filter_params.iter());

        let conn = self.lock_conn()?;
        let count = conn.execute(&sql, params_from_iter(params))?;
        drop(conn);

        self.notifier.publish(ChangeEvent {
            table,
            kind: ChangeKind::Updated,
            row_id: filter.single_row_id(),
            count,
        });
        Ok(count)
    }

    fn delete(&self, table: Table, filter: &RowFilter) -> Result<usize> {
        let (where_sql, params) = Self::where_clause(table, filter)?;
        let sql = format!("DELETE FROM {}{}", table.name(), where_sql);

        let conn = self.lock_conn()?;
        let count = conn.execute(&sql, params_from_iter(params.iter()))?;
        drop(conn);

        self.notifier.publish(ChangeEvent {
            table,
            kind: ChangeKind::Deleted,
            row_id: filter.single_row_id(),
            count,
        });
        Ok(count)
    }

    fn count(&self, table: Table, filter: &RowFilter) -> Result<usize> {
        let conn = self.lock_conn()?;
        Self::count_rows(&conn, table, filter)
    }

    fn upsert(&self, table: Table, natural_key: &str, values: &Values) -> Result<UpsertOutcome> {
        let key_column = table.natural_key();
        if let Some(existing) = values.get(key_column) {
            if existing.as_str() != Some(natural_key) {
                return Err(MatchCityError::InvalidInput(format!(
                    "Upsert values carry a different {} than the key {}",
                    key_column, natural_key
                )));
            }
        }

        let mut row = values.clone();
        row.set(key_column, natural_key);
        if table.stamps_updated() {
            row.set(KEY_UPDATED, Utc::now().timestamp_millis());
        }
        row.validate(table)?;

        let columns: Vec<&str> = row.iter().map(|(column, _)| column).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let mut assignments: Vec<String> = columns
            .iter()
            .filter(|column| **column != key_column)
            .map(|column| format!("{column} = excluded.{column}"))
            .collect();
        if assignments.is_empty() {
            // Keeps RETURNING producing a row when only the key is given.
            assignments.push(format!("{key_column} = excluded.{key_column}"));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {} RETURNING {}",
            table.name(),
            columns.join(", "),
            placeholders,
            key_column,
            assignments.join(", "),
            KEY_ID
        );

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?",
                    KEY_ID,
                    table.name(),
                    key_column
                ),
                [natural_key],
                |row| row.get(0),
            )
            .optional()?;
        let row_id: i64 = tx.query_row(
            &sql,
            params_from_iter(row.iter().map(|(_, value)| value)),
            |row| row.get(0),
        )?;
        tx.commit()?;
        drop(conn);

        let (outcome, kind) = match existing {
            Some(_) => (UpsertOutcome::Updated(row_id), ChangeKind::Updated),
            None => (UpsertOutcome::Inserted(row_id), ChangeKind::Inserted),
        };
        debug!(table = %table, key = natural_key, row_id, ?kind, "upserted row");

        self.notifier.publish(ChangeEvent {
            table,
            kind,
            row_id: Some(row_id),
            count: 1,
        });
        Ok(outcome)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    fn check_integrity(&self) -> Result<IntegrityReport> {
        let conn = self.lock_conn()?;

        let mut duplicate_keys = Vec::new();
        for table in Table::ALL {
            duplicate_keys.extend(Self::duplicate_keys(&conn, table)?);
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT s.sub_activity_id
            FROM sub_activities s
            LEFT JOIN activities a ON a.activity_id = s.activity_id
            WHERE a._id IS NULL
            ORDER BY s.sub_activity_id
            "#,
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut orphaned_sub_activities = Vec::new();
        for row in rows {
            orphaned_sub_activities.push(row?);
        }

        Ok(IntegrityReport {
            schema_version: schema::stored_version(&conn)?,
            duplicate_keys,
            orphaned_sub_activities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{
        NewActivity, NewSubActivity, NewVenue, KEY_ACTIVITY_CATEGORY, KEY_ACTIVITY_TITLE,
        KEY_NAME, KEY_VENUE_ID,
    };

    fn venue(id: &str, name: &str) -> NewVenue {
        NewVenue {
            venue_id: id.to_string(),
            name: name.to_string(),
            address: "1 Market Square".to_string(),
            postcode: "MK1 1AA".to_string(),
            latitude: 52.04,
            longitude: -0.76,
            web: "https://venue.example".to_string(),
            email: "hello@venue.example".to_string(),
            telephone: "01908 000000".to_string(),
        }
    }

    fn activity(id: &str, title: &str, category: &str) -> NewActivity {
        NewActivity {
            activity_id: id.to_string(),
            title: title.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_upsert_inserts_then_updates_one_row() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = store
            .upsert_record(&activity("a1", "Swimming", "Water"))
            .unwrap();
        let second = store
            .upsert_record(&activity("a1", "Open Water Swimming", "Outdoor"))
            .unwrap();

        assert!(first.is_insert());
        assert_eq!(second, UpsertOutcome::Updated(first.row_id()));
        let activities = store.activities().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].title, "Open Water Swimming");
        assert_eq!(activities[0].category, "Outdoor");
    }

    #[test]
    fn test_upsert_keeps_natural_key_and_stamps_venue() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_record(&venue("v1", "Pool")).unwrap();
        store.upsert_record(&venue("v1", "Leisure Pool")).unwrap();

        let stored = store.find_venue("v1").unwrap().unwrap();
        assert_eq!(stored.venue_id, "v1");
        assert_eq!(stored.name, "Leisure Pool");
        assert!(stored.updated.timestamp_millis() > 0);
    }

    #[test]
    fn test_typed_upserts_through_dyn_store() {
        let sqlite = SqliteStore::open_in_memory().unwrap();
        let store: &dyn LocalStore = &sqlite;

        assert!(store.upsert_venue(&venue("v1", "Pool")).unwrap().is_insert());
        assert!(store
            .upsert_activity(&activity("a1", "Swimming", "Water"))
            .unwrap()
            .is_insert());
        let sub = NewSubActivity {
            sub_activity_id: "s1".to_string(),
            title: "Lengths".to_string(),
            activity_id: "a1".to_string(),
        };
        assert!(store.upsert_sub_activity(&sub).unwrap().is_insert());
        assert!(!store.upsert_sub_activity(&sub).unwrap().is_insert());

        assert_eq!(store.find_venue("v1").unwrap().unwrap().name, "Pool");
        assert_eq!(store.sub_activities(Some("a1")).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_rejects_conflicting_key_in_values() {
        let store = SqliteStore::open_in_memory().unwrap();
        let values = Values::new().put(KEY_VENUE_ID, "other").put(KEY_NAME, "x");
        assert!(store.upsert(Table::Venues, "v1", &values).is_err());
    }

    #[test]
    fn test_insert_query_update_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let values = Values::new()
            .put("activity_id", "a2")
            .put(KEY_ACTIVITY_TITLE, "Tennis")
            .put(KEY_ACTIVITY_CATEGORY, "Racket");
        let row_id = store.insert(Table::Activities, &values).unwrap();

        let record = store.get(Table::Activities, row_id).unwrap().unwrap();
        assert_eq!(record.text(KEY_ACTIVITY_TITLE), Some("Tennis"));

        let changed = store
            .update(
                Table::Activities,
                &RowFilter::by_row_id(row_id),
                &Values::new().put(KEY_ACTIVITY_CATEGORY, "Court"),
            )
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(
            store.find_activity("a2").unwrap().unwrap().category,
            "Court"
        );

        let removed = store
            .delete(
                Table::Activities,
                &RowFilter::new().eq(KEY_ACTIVITY_CATEGORY, "Court"),
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(Table::Activities, row_id).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let values = Values::new().put("activity_id", "a1").put(KEY_ACTIVITY_TITLE, "x");
        store.insert(Table::Activities, &values).unwrap();
        let err = store.insert(Table::Activities, &values).unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_default_sort_is_by_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_record(&venue("v1", "Stadium")).unwrap();
        store.upsert_record(&venue("v2", "Arena")).unwrap();
        store.upsert_record(&venue("v3", "Moor")).unwrap();

        let names: Vec<String> = store.venues().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["Arena", "Moor", "Stadium"]);

        let sorted = store
            .query(
                Table::Venues,
                &RowFilter::all(),
                Some(&SortOrder::descending(KEY_VENUE_ID)),
            )
            .unwrap();
        assert_eq!(sorted[0].text(KEY_VENUE_ID), Some("v3"));
    }

    #[test]
    fn test_filter_values_are_bound_not_spliced() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_record(&venue("v1", "O'Brien's Gym")).unwrap();

        let found = store
            .query(
                Table::Venues,
                &RowFilter::new().eq(KEY_NAME, "O'Brien's Gym"),
                None,
            )
            .unwrap();
        assert_eq!(found.len(), 1);

        let injected = store
            .query(
                Table::Venues,
                &RowFilter::new().eq(KEY_NAME, "x' OR '1'='1"),
                None,
            )
            .unwrap();
        assert!(injected.is_empty());

        let bad_column = store.query(
            Table::Venues,
            &RowFilter::new().eq("name = name OR 1", "x"),
            None,
        );
        assert!(bad_column.is_err());
    }

    #[test]
    fn test_like_and_null_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_record(&activity("a1", "Badminton", "Racket"))
            .unwrap();
        store
            .insert(Table::Activities, &Values::new().put("activity_id", "a2"))
            .unwrap();

        let like = store
            .query(
                Table::Activities,
                &RowFilter::new().like(KEY_ACTIVITY_TITLE, "Bad%"),
                None,
            )
            .unwrap();
        assert_eq!(like.len(), 1);

        let null_title = store
            .count(
                Table::Activities,
                &RowFilter::new().eq(KEY_ACTIVITY_TITLE, FieldValue::Null),
            )
            .unwrap();
        assert_eq!(null_title, 1);
    }

    #[test]
    fn test_change_events_are_published() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();

        let outcome = store.upsert_record(&activity("a1", "Judo", "Martial")).unwrap();
        store.upsert_record(&activity("a1", "Judo", "Combat")).unwrap();
        store
            .delete(Table::Activities, &RowFilter::by_row_id(outcome.row_id()))
            .unwrap();
        store
            .delete(Table::Activities, &RowFilter::all())
            .unwrap();

        let kinds: Vec<ChangeKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Inserted, ChangeKind::Updated, ChangeKind::Deleted]
        );
    }

    #[test]
    fn test_sub_activities_by_parent() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (id, title, parent) in [("s1", "Front crawl", "a1"), ("s2", "Doubles", "a2")] {
            store
                .upsert_record(&NewSubActivity {
                    sub_activity_id: id.to_string(),
                    title: title.to_string(),
                    activity_id: parent.to_string(),
                })
                .unwrap();
        }

        let swimming = store.sub_activities(Some("a1")).unwrap();
        assert_eq!(swimming.len(), 1);
        assert_eq!(swimming[0].sub_activity_id, "s1");
        assert_eq!(store.sub_activities(None).unwrap().len(), 2);
    }

    #[test]
    fn test_check_integrity_reports_orphans() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_record(&activity("a1", "Swim", "Water")).unwrap();
        for (id, parent) in [("s1", "a1"), ("s2", "missing")] {
            store
                .upsert_record(&NewSubActivity {
                    sub_activity_id: id.to_string(),
                    title: "x".to_string(),
                    activity_id: parent.to_string(),
                })
                .unwrap();
        }

        let report = store.check_integrity().unwrap();
        assert_eq!(report.schema_version, SCHEMA_VERSION);
        assert!(report.duplicate_keys.is_empty());
        assert_eq!(report.orphaned_sub_activities, vec!["s2".to_string()]);
        assert!(!report.is_ok());
    }

    #[test]
    fn test_reset_empties_tables() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_record(&venue("v1", "Pool")).unwrap();
        let mut rx = store.subscribe();

        store.reset().unwrap();

        assert_eq!(store.count(Table::Venues, &RowFilter::all()).unwrap(), 0);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.table, Table::Venues);
        assert_eq!(event.kind, ChangeKind::Deleted);
        assert_eq!(event.count, 1);
    }
}
