//! Local store trait definition.
//!
//! The `LocalStore` trait is the CRUD surface the rest of the application
//! uses: per-table insert, query, update and delete by filter, plus the
//! natural-key upsert the sync job relies on and change notification for
//! anything presenting the data.

use tokio::sync::broadcast;

use super::types::{
    Activity, ChangeEvent, IntegrityReport, NaturalRecord, NewActivity, NewSubActivity, NewVenue,
    Record, RowFilter, SortOrder, SubActivity, Table, UpsertOutcome, Values, Venue,
    KEY_SUB_ACTIVITY_ACTIVITY_ID,
};
use crate::error::Result;

/// Storage interface for the local copy of the feeds.
///
/// All implementations must ensure:
/// - At most one row per natural key per table
/// - Filter values are bound as parameters, never spliced into SQL
/// - Every change that touches at least one row is published to subscribers
pub trait LocalStore: Send + Sync {
    // --- Generic CRUD ---

    /// Insert a new row.
    ///
    /// # Returns
    ///
    /// Returns the surrogate id of the new row.
    ///
    /// # Errors
    ///
    /// Returns `MatchCityError::InvalidInput` if a column is unknown, and a
    /// storage error if the row violates a constraint (e.g. a duplicate
    /// natural key).
    fn insert(&self, table: Table, values: &Values) -> Result<i64>;

    /// Query rows matching the filter.
    ///
    /// Without an explicit sort, rows come back ordered by the table's
    /// display column (`name` for venues, `title` otherwise).
    fn query(
        &self,
        table: Table,
        filter: &RowFilter,
        sort: Option<&SortOrder>,
    ) -> Result<Vec<Record>>;

    /// Update every row matching the filter.
    ///
    /// # Returns
    ///
    /// Returns the number of rows changed.
    fn update(&self, table: Table, filter: &RowFilter, values: &Values) -> Result<usize>;

    /// Delete every row matching the filter.
    ///
    /// # Returns
    ///
    /// Returns the number of rows removed.
    fn delete(&self, table: Table, filter: &RowFilter) -> Result<usize>;

    /// Count rows matching the filter.
    fn count(&self, table: Table, filter: &RowFilter) -> Result<usize>;

    /// Insert the row if its natural key is absent, otherwise overwrite its
    /// attributes. The natural key itself is never rewritten.
    ///
    /// Atomic with respect to other callers: concurrent upserts of one key
    /// leave exactly one row.
    fn upsert(&self, table: Table, natural_key: &str, values: &Values) -> Result<UpsertOutcome>;

    /// Subscribe to change events for all tables.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Check store invariants.
    ///
    /// Verifies:
    /// - No natural key is held by more than one row
    /// - Every sub-activity references an existing activity
    fn check_integrity(&self) -> Result<IntegrityReport>;

    // --- Provided helpers ---

    /// Get a single row by surrogate id.
    fn get(&self, table: Table, row_id: i64) -> Result<Option<Record>> {
        Ok(self
            .query(table, &RowFilter::by_row_id(row_id), None)?
            .into_iter()
            .next())
    }

    /// Upsert a typed record by its natural key.
    fn upsert_record<R: NaturalRecord>(&self, record: &R) -> Result<UpsertOutcome>
    where
        Self: Sized,
    {
        self.upsert(R::TABLE, record.natural_key(), &record.values())
    }

    fn upsert_venue(&self, venue: &NewVenue) -> Result<UpsertOutcome> {
        self.upsert(Table::Venues, venue.natural_key(), &venue.values())
    }

    fn upsert_activity(&self, activity: &NewActivity) -> Result<UpsertOutcome> {
        self.upsert(Table::Activities, activity.natural_key(), &activity.values())
    }

    fn upsert_sub_activity(&self, sub_activity: &NewSubActivity) -> Result<UpsertOutcome> {
        self.upsert(
            Table::SubActivities,
            sub_activity.natural_key(),
            &sub_activity.values(),
        )
    }

    /// All venues, ordered by name.
    fn venues(&self) -> Result<Vec<Venue>> {
        self.query(Table::Venues, &RowFilter::all(), None)?
            .into_iter()
            .map(Venue::try_from)
            .collect()
    }

    /// All activities, ordered by title.
    fn activities(&self) -> Result<Vec<Activity>> {
        self.query(Table::Activities, &RowFilter::all(), None)?
            .into_iter()
            .map(Activity::try_from)
            .collect()
    }

    /// Sub-activities ordered by title, optionally limited to one parent activity.
    fn sub_activities(&self, activity_id: Option<&str>) -> Result<Vec<SubActivity>> {
        let filter = match activity_id {
            Some(id) => RowFilter::new().eq(KEY_SUB_ACTIVITY_ACTIVITY_ID, id),
            None => RowFilter::all(),
        };
        self.query(Table::SubActivities, &filter, None)?
            .into_iter()
            .map(SubActivity::try_from)
            .collect()
    }

    /// Find a venue by its feed identifier.
    fn find_venue(&self, venue_id: &str) -> Result<Option<Venue>> {
        find_by_key(self, Table::Venues, venue_id)?
            .map(Venue::try_from)
            .transpose()
    }

    /// Find an activity by its feed identifier.
    fn find_activity(&self, activity_id: &str) -> Result<Option<Activity>> {
        find_by_key(self, Table::Activities, activity_id)?
            .map(Activity::try_from)
            .transpose()
    }

    /// Find a sub-activity by its feed identifier.
    fn find_sub_activity(&self, sub_activity_id: &str) -> Result<Option<SubActivity>> {
        find_by_key(self, Table::SubActivities, sub_activity_id)?
            .map(SubActivity::try_from)
            .transpose()
    }
}

fn find_by_key<S: LocalStore + ?Sized>(
    store: &S,
    table: Table,
    natural_key: &str,
) -> Result<Option<Record>> {
    let filter = RowFilter::new().eq(table.natural_key(), natural_key);
    Ok(store.query(table, &filter, None)?.into_iter().next())
}
