//! # Match the City Core
//!
//! Core library for Match the City - keeps a local SQLite copy of the
//! venue, activity and sub-activity feeds published by the Match the City
//! server.
//!
//! This crate provides the store, the feed parsers and the sync job,
//! independent of the CLI interface.
//!
//! ## Architecture
//!
//! - **storage**: Local store trait, SQLite backend and change notification
//! - **feed**: Feed payload parsing (JSON arrays into records)
//! - **fetch**: HTTP feed source
//! - **sync**: One sync cycle over all three feeds
//! - **schedule**: Periodic runner driving the sync job

pub mod error;
pub mod feed;
pub mod fetch;
pub mod schedule;
pub mod storage;
pub mod sync;

pub use error::{MatchCityError, Result};
pub use feed::FeedKind;
pub use fetch::{FeedSource, FetchResponse, HttpFeedSource};
pub use schedule::PeriodicSync;
pub use storage::{LocalStore, SqliteStore};
pub use sync::{FeedEndpoints, FeedOutcome, SyncJob, SyncReport};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
