//! Error types for Match the City core operations.
//!
//! Storage errors are fatal to a sync cycle. Feed errors (transport,
//! malformed URL, malformed payload) are caught by the sync job and recorded
//! as that feed's outcome; the CLI layer maps whatever reaches it to
//! user-facing messages.

use thiserror::Error;

use crate::feed::FeedKind;

/// Result type alias for Match the City operations.
pub type Result<T> = std::result::Result<T, MatchCityError>;

/// Core error type for Match the City operations.
#[derive(Debug, Error)]
pub enum MatchCityError {
    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// Endpoint URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Feed payload is not a JSON array of well-formed records
    #[error("Malformed {feed} feed: {message}")]
    Feed { feed: FeedKind, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Invalid caller input (unknown table, unknown column)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl MatchCityError {
    /// Whether this error comes from the local store.
    ///
    /// The sync job propagates these; everything else is scoped to one feed.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            MatchCityError::Storage(_) | MatchCityError::Sqlite { .. } | MatchCityError::Io { .. }
        )
    }
}
