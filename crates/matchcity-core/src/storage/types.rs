//! Core data types for the storage layer.
//!
//! Rows are addressed two ways: by the surrogate `_id` the store assigns,
//! and by the natural key the remote feed supplies. The generic CRUD surface
//! works on [`Record`]s and [`Values`]; the typed domain structs are parsed
//! out of records in `sqlite::row`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{MatchCityError, Result};

/// Surrogate row id column, present on every table.
pub const KEY_ID: &str = "_id";

pub const KEY_VENUE_ID: &str = "venue_id";
pub const KEY_NAME: &str = "name";
pub const KEY_UPDATED: &str = "updated";
pub const KEY_LOCATION_LAT: &str = "latitude";
pub const KEY_LOCATION_LNG: &str = "longitude";
pub const KEY_TELEPHONE: &str = "telephone";
pub const KEY_EMAIL: &str = "email";
pub const KEY_WEB: &str = "web";
pub const KEY_ADDRESS: &str = "address";
pub const KEY_POSTCODE: &str = "postcode";

pub const KEY_ACTIVITY_ID: &str = "activity_id";
pub const KEY_ACTIVITY_TITLE: &str = "title";
pub const KEY_ACTIVITY_CATEGORY: &str = "category";

pub const KEY_SUB_ACTIVITY_ID: &str = "sub_activity_id";
pub const KEY_SUB_ACTIVITY_TITLE: &str = "title";
pub const KEY_SUB_ACTIVITY_ACTIVITY_ID: &str = "activity_id";

/// The three tables held by the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Venues,
    Activities,
    SubActivities,
}

impl Table {
    /// All tables, in sync order.
    pub const ALL: [Table; 3] = [Table::Venues, Table::Activities, Table::SubActivities];

    /// SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Venues => "venues",
            Table::Activities => "activities",
            Table::SubActivities => "sub_activities",
        }
    }

    /// Column holding the feed-supplied identifier.
    pub fn natural_key(&self) -> &'static str {
        match self {
            Table::Venues => KEY_VENUE_ID,
            Table::Activities => KEY_ACTIVITY_ID,
            Table::SubActivities => KEY_SUB_ACTIVITY_ID,
        }
    }

    /// Data columns, excluding `_id`, in schema order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Venues => &[
                KEY_VENUE_ID,
                KEY_NAME,
                KEY_UPDATED,
                KEY_LOCATION_LAT,
                KEY_LOCATION_LNG,
                KEY_TELEPHONE,
                KEY_ADDRESS,
                KEY_POSTCODE,
                KEY_WEB,
                KEY_EMAIL,
            ],
            Table::Activities => &[KEY_ACTIVITY_ID, KEY_ACTIVITY_TITLE, KEY_ACTIVITY_CATEGORY],
            Table::SubActivities => &[
                KEY_SUB_ACTIVITY_ID,
                KEY_SUB_ACTIVITY_TITLE,
                KEY_SUB_ACTIVITY_ACTIVITY_ID,
            ],
        }
    }

    /// Sort column used when a query does not specify one.
    pub fn default_sort(&self) -> &'static str {
        match self {
            Table::Venues => KEY_NAME,
            Table::Activities => KEY_ACTIVITY_TITLE,
            Table::SubActivities => KEY_SUB_ACTIVITY_TITLE,
        }
    }

    /// Whether upserts into this table stamp the `updated` column.
    pub fn stamps_updated(&self) -> bool {
        matches!(self, Table::Venues)
    }

    /// Whether `column` names `_id` or one of this table's data columns.
    pub fn has_column(&self, column: &str) -> bool {
        column == KEY_ID || self.columns().contains(&column)
    }

    /// Validate a column name against this table.
    pub fn check_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(MatchCityError::InvalidInput(format!(
                "Unknown column \"{}\" for table {}",
                column,
                self.name()
            )))
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = MatchCityError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "venues" | "venue" => Ok(Table::Venues),
            "activities" | "activity" => Ok(Table::Activities),
            "sub_activities" | "sub-activities" | "subactivities" | "sub_activity"
            | "sub-activity" => Ok(Table::SubActivities),
            other => Err(MatchCityError::InvalidInput(format!(
                "Unknown table: {} (use venues, activities or sub-activities)",
                other
            ))),
        }
    }
}

/// A single column value as stored in SQLite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Real(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str(""),
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Real(value) => write!(f, "{}", value),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Text(value.clone())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            FieldValue::Integer(value) => ToSqlOutput::Borrowed(ValueRef::Integer(*value)),
            FieldValue::Real(value) => ToSqlOutput::Borrowed(ValueRef::Real(*value)),
            FieldValue::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
        })
    }
}

impl FromSql for FieldValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Integer(value) => FieldValue::Integer(value),
            ValueRef::Real(value) => FieldValue::Real(value),
            ValueRef::Text(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        })
    }
}

/// Column values for an insert, update or upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    fields: BTreeMap<String, FieldValue>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing any previous value.
    pub fn put(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(column, value)| (column.as_str(), value))
    }

    /// Ensure every column exists on `table` and `_id` is not being written.
    pub fn validate(&self, table: Table) -> Result<()> {
        if self.fields.is_empty() {
            return Err(MatchCityError::InvalidInput(
                "No column values given".to_string(),
            ));
        }
        for column in self.fields.keys() {
            if column == KEY_ID {
                return Err(MatchCityError::InvalidInput(format!(
                    "Column {} is assigned by the store",
                    KEY_ID
                )));
            }
            table.check_column(column)?;
        }
        Ok(())
    }
}

/// A row returned by a generic query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Surrogate row id
    #[serde(rename = "_id")]
    pub row_id: i64,

    /// Column values keyed by column name
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(FieldValue::as_str)
    }
}

/// One predicate of a [`RowFilter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Column equals value (`IS NULL` for [`FieldValue::Null`])
    Eq(String, FieldValue),
    /// Column matches an SQL `LIKE` pattern
    Like(String, String),
    /// Surrogate row id equals
    RowId(i64),
}

/// Conjunction of conditions selecting rows. Empty selects every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter {
    pub conditions: Vec<Condition>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching one row by surrogate id.
    pub fn by_row_id(row_id: i64) -> Self {
        Self::new().row_id(row_id)
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditions.push(Condition::Eq(column.into(), value.into()));
        self
    }

    pub fn like(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.conditions
            .push(Condition::Like(column.into(), pattern.into()));
        self
    }

    pub fn row_id(mut self, row_id: i64) -> Self {
        self.conditions.push(Condition::RowId(row_id));
        self
    }

    /// The row id this filter pins, if it pins exactly one.
    pub fn single_row_id(&self) -> Option<i64> {
        match self.conditions.as_slice() {
            [Condition::RowId(row_id)] => Some(*row_id),
            _ => None,
        }
    }
}

/// Result ordering for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub column: String,
    pub descending: bool,
}

impl SortOrder {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

impl FromStr for SortOrder {
    type Err = MatchCityError;

    /// Parse `column`, `column:asc` or `column:desc`.
    fn from_str(value: &str) -> Result<Self> {
        let (column, direction) = match value.split_once(':') {
            Some((column, direction)) => (column.trim(), direction.trim()),
            None => (value.trim(), "asc"),
        };
        if column.is_empty() {
            return Err(MatchCityError::InvalidInput(
                "Sort column cannot be empty".to_string(),
            ));
        }
        match direction.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::ascending(column)),
            "desc" => Ok(SortOrder::descending(column)),
            other => Err(MatchCityError::InvalidInput(format!(
                "Invalid sort direction: {} (use asc or desc)",
                other
            ))),
        }
    }
}

/// Whether an upsert created or overwrote its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn row_id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(row_id) | UpsertOutcome::Updated(row_id) => *row_id,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// What a change event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// Published to subscribers whenever rows of a table change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Affected row, when the change addressed exactly one
    pub row_id: Option<i64>,
    /// Number of rows affected
    pub count: usize,
}

/// A venue as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub row_id: i64,
    pub venue_id: String,
    pub name: String,
    pub address: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub web: String,
    pub email: String,
    pub telephone: String,
    /// When the last sync wrote this row
    pub updated: DateTime<Utc>,
}

/// An activity as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub row_id: i64,
    pub activity_id: String,
    pub title: String,
    pub category: String,
}

/// A sub-activity as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubActivity {
    pub row_id: i64,
    pub sub_activity_id: String,
    pub title: String,
    /// Natural key of the parent activity
    pub activity_id: String,
}

/// A record that can be upserted by natural key.
pub trait NaturalRecord {
    /// Table the record belongs to.
    const TABLE: Table;

    /// Feed-supplied identifier.
    fn natural_key(&self) -> &str;

    /// Attribute columns, excluding the natural key.
    fn values(&self) -> Values;
}

/// Venue attributes as received from the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVenue {
    pub venue_id: String,
    pub name: String,
    pub address: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub web: String,
    pub email: String,
    pub telephone: String,
}

impl NaturalRecord for NewVenue {
    const TABLE: Table = Table::Venues;

    fn natural_key(&self) -> &str {
        &self.venue_id
    }

    fn values(&self) -> Values {
        Values::new()
            .put(KEY_NAME, &self.name)
            .put(KEY_ADDRESS, &self.address)
            .put(KEY_POSTCODE, &self.postcode)
            .put(KEY_LOCATION_LAT, self.latitude)
            .put(KEY_LOCATION_LNG, self.longitude)
            .put(KEY_WEB, &self.web)
            .put(KEY_EMAIL, &self.email)
            .put(KEY_TELEPHONE, &self.telephone)
    }
}

/// Activity attributes as received from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub activity_id: String,
    pub title: String,
    pub category: String,
}

impl NaturalRecord for NewActivity {
    const TABLE: Table = Table::Activities;

    fn natural_key(&self) -> &str {
        &self.activity_id
    }

    fn values(&self) -> Values {
        Values::new()
            .put(KEY_ACTIVITY_TITLE, &self.title)
            .put(KEY_ACTIVITY_CATEGORY, &self.category)
    }
}

/// Sub-activity attributes as received from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubActivity {
    pub sub_activity_id: String,
    pub title: String,
    pub activity_id: String,
}

impl NaturalRecord for NewSubActivity {
    const TABLE: Table = Table::SubActivities;

    fn natural_key(&self) -> &str {
        &self.sub_activity_id
    }

    fn values(&self) -> Values {
        Values::new()
            .put(KEY_SUB_ACTIVITY_TITLE, &self.title)
            .put(KEY_SUB_ACTIVITY_ACTIVITY_ID, &self.activity_id)
    }
}

/// Result of [`crate::storage::LocalStore::check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    /// Stored schema version
    pub schema_version: i32,
    /// Natural keys held by more than one row, per table
    pub duplicate_keys: Vec<(Table, String)>,
    /// Sub-activity natural keys whose parent activity is missing
    pub orphaned_sub_activities: Vec<String>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.duplicate_keys.is_empty() && self.orphaned_sub_activities.is_empty()
    }
}
