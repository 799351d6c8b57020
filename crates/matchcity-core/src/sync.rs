//! One sync cycle over the venue, activity and sub-activity feeds.
//!
//! Each feed is fetched, parsed and upserted independently. Feed-level
//! failures (transport, HTTP status, malformed payload) are logged and
//! recorded in the [`SyncReport`]; they never stop the other feeds. Storage
//! failures abort the cycle and are returned to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::feed::{self, FeedKind};
use crate::fetch::{parse_endpoint, FeedSource};
use crate::storage::types::{NaturalRecord, UpsertOutcome};
use crate::storage::LocalStore;

/// Endpoint URL per feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEndpoints {
    pub venues_url: String,
    pub activities_url: String,
    pub sub_activities_url: String,
}

impl FeedEndpoints {
    pub fn url(&self, kind: FeedKind) -> &str {
        match kind {
            FeedKind::Venues => &self.venues_url,
            FeedKind::Activities => &self.activities_url,
            FeedKind::SubActivities => &self.sub_activities_url,
        }
    }

    /// Check every URL parses as http(s).
    pub fn validate(&self) -> Result<()> {
        for kind in FeedKind::ALL {
            parse_endpoint(self.url(kind))?;
        }
        Ok(())
    }
}

/// What one feed pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FeedOutcome {
    /// Payload applied
    Synced { inserted: usize, updated: usize },
    /// Server answered with a non-success status; nothing applied
    Skipped { status: u16 },
    /// Fetch or parse failed; nothing applied
    Failed { reason: String },
}

impl FeedOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, FeedOutcome::Synced { .. })
    }
}

/// Outcome of a single feed within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub feed: FeedKind,
    #[serde(flatten)]
    pub outcome: FeedOutcome,
}

/// Outcome of a whole sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feeds: Vec<FeedReport>,
}

impl SyncReport {
    pub fn outcome(&self, kind: FeedKind) -> Option<&FeedOutcome> {
        self.feeds
            .iter()
            .find(|report| report.feed == kind)
            .map(|report| &report.outcome)
    }

    /// Rows inserted plus rows updated across all feeds.
    pub fn total_changes(&self) -> usize {
        self.feeds
            .iter()
            .map(|report| match report.outcome {
                FeedOutcome::Synced { inserted, updated } => inserted + updated,
                _ => 0,
            })
            .sum()
    }

    /// Whether every feed was applied.
    pub fn is_complete(&self) -> bool {
        self.feeds.iter().all(|report| report.outcome.is_synced())
    }
}

/// Fetch-parse-upsert over all three feeds.
///
/// Holds no state between cycles beyond its configuration. Concurrent calls
/// to [`SyncJob::refresh`] on one job run one after another.
pub struct SyncJob<S, L> {
    source: S,
    store: Arc<L>,
    endpoints: FeedEndpoints,
    cycle_lock: Mutex<()>,
}

impl<S: FeedSource, L: LocalStore> SyncJob<S, L> {
    pub fn new(source: S, store: Arc<L>, endpoints: FeedEndpoints) -> Self {
        Self {
            source,
            store,
            endpoints,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &Arc<L> {
        &self.store
    }

    pub fn endpoints(&self) -> &FeedEndpoints {
        &self.endpoints
    }

    /// Run one sync cycle: venues, then activities, then sub-activities.
    ///
    /// # Errors
    ///
    /// Only storage errors are returned; feed failures are reported in the
    /// [`SyncReport`].
    pub async fn refresh(&self) -> Result<SyncReport> {
        let _cycle = self.cycle_lock.lock().await;
        let started_at = Utc::now();
        info!("Started sync cycle");

        let mut feeds = Vec::with_capacity(FeedKind::ALL.len());
        for kind in FeedKind::ALL {
            let outcome = self.refresh_feed(kind).await?;
            feeds.push(FeedReport {
                feed: kind,
                outcome,
            });
        }

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            feeds,
        };
        info!(
            changes = report.total_changes(),
            complete = report.is_complete(),
            "Finished sync cycle"
        );
        Ok(report)
    }

    /// Run the pass for a single feed.
    pub async fn refresh_feed(&self, kind: FeedKind) -> Result<FeedOutcome> {
        match kind {
            FeedKind::Venues => self.sync_records(kind, feed::parse_venues).await,
            FeedKind::Activities => self.sync_records(kind, feed::parse_activities).await,
            FeedKind::SubActivities => self.sync_records(kind, feed::parse_sub_activities).await,
        }
    }

    async fn sync_records<R>(
        &self,
        kind: FeedKind,
        parse: fn(&str) -> Result<Vec<R>>,
    ) -> Result<FeedOutcome>
    where
        R: NaturalRecord,
    {
        let url = self.endpoints.url(kind);

        let response = match self.source.fetch(url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(feed = %kind, url, error = %err, "Feed fetch failed");
                return Ok(FeedOutcome::Failed {
                    reason: err.to_string(),
                });
            }
        };

        if !response.is_success() {
            warn!(feed = %kind, url, status = response.status, "Feed returned non-success status");
            return Ok(FeedOutcome::Skipped {
                status: response.status,
            });
        }

        let records = match parse(&response.body) {
            Ok(records) => records,
            Err(err) => {
                warn!(feed = %kind, url, error = %err, "Feed payload rejected");
                return Ok(FeedOutcome::Failed {
                    reason: err.to_string(),
                });
            }
        };

        let mut inserted = 0;
        let mut updated = 0;
        for record in &records {
            match self.store.upsert_record(record)? {
                UpsertOutcome::Inserted(_) => inserted += 1,
                UpsertOutcome::Updated(_) => updated += 1,
            }
        }

        info!(feed = %kind, inserted, updated, "Feed synced");
        Ok(FeedOutcome::Synced { inserted, updated })
    }
}
