//! Storage layer: the local copy of the three feeds.

pub mod notify;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use notify::ChangeNotifier;
pub use sqlite::{SqliteStore, SCHEMA_VERSION};
pub use traits::LocalStore;
pub use types::{
    Activity, ChangeEvent, ChangeKind, Condition, FieldValue, IntegrityReport, NaturalRecord,
    NewActivity, NewSubActivity, NewVenue, Record, RowFilter, SortOrder, SubActivity, Table,
    UpsertOutcome, Values, Venue,
};
