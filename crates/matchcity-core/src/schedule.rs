//! Periodic runner for the sync job.
//!
//! The runner owns the timer; the job stays stateless. A zero frequency
//! disables periodic refresh and the runner performs a single cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::fetch::FeedSource;
use crate::storage::LocalStore;
use crate::sync::{SyncJob, SyncReport};

/// Refresh frequency used when none is configured.
pub const DEFAULT_REFRESH_MINUTES: u64 = 1;

/// Drives a [`SyncJob`] on a fixed interval.
pub struct PeriodicSync<S, L> {
    job: Arc<SyncJob<S, L>>,
    frequency: Duration,
}

impl<S: FeedSource, L: LocalStore> PeriodicSync<S, L> {
    pub fn new(job: Arc<SyncJob<S, L>>, frequency: Duration) -> Self {
        Self { job, frequency }
    }

    /// Build from a frequency in minutes. Oversized values saturate.
    pub fn from_minutes(job: Arc<SyncJob<S, L>>, minutes: u64) -> Self {
        Self::new(job, Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    /// Run cycles until `shutdown` resolves, starting with one immediately.
    ///
    /// # Returns
    ///
    /// Returns the number of cycles started.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if self.frequency.is_zero() {
            info!("Periodic refresh disabled, running a single sync cycle");
            return tokio::select! {
                biased;
                _ = &mut shutdown => 0,
                _ = self.run_cycle() => 1,
            };
        }

        info!(
            every_secs = self.frequency.as_secs_f64(),
            "Periodic sync started"
        );
        let mut interval = tokio::time::interval(self.frequency);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(cycles, "Periodic sync stopping");
                    break;
                }
                _ = interval.tick() => {
                    cycles += 1;
                    self.run_cycle().await;
                }
            }
        }
        cycles
    }

    /// Run one cycle, logging a storage failure instead of returning it.
    pub async fn run_cycle(&self) -> Option<SyncReport> {
        match self.job.refresh().await {
            Ok(report) => Some(report),
            Err(err) => {
                error!(error = %err, "Sync cycle aborted by storage failure");
                None
            }
        }
    }
}
