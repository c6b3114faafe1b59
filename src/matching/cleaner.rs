//! Periodic purge of abandoned searching rows

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::store::QueueStore;
use crate::utils::current_timestamp;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Deletes searching rows older than the stale threshold.
/// Matched rows are left alone.
pub struct Cleaner {
    queue: Arc<dyn QueueStore>,
    stale_after: Duration,
    metrics: Arc<MetricsCollector>,
}

impl Cleaner {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        stale_after: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queue,
            stale_after,
            metrics,
        }
    }

    /// Delete searching rows created before `now - stale_after`
    pub async fn purge_stale_at(&self, now: DateTime<Utc>) -> Result<u64> {
        self.queue
            .purge_searching_before(now - self.stale_after)
            .await
    }

    pub async fn purge_stale(&self) -> Result<u64> {
        self.purge_stale_at(current_timestamp()).await
    }

    /// One sweep; failures are logged and leave rows for the next sweep
    pub async fn sweep(&self) -> u64 {
        match self.purge_stale().await {
            Ok(purged) => {
                if purged > 0 {
                    info!("Purged {} stale queue entries", purged);
                } else {
                    debug!("Cleanup sweep found no stale entries");
                }
                self.metrics.record_cleanup(Some(purged));
                purged
            }
            Err(e) => {
                error!("Error during queue cleanup: {}", e);
                self.metrics.record_cleanup(None);
                0
            }
        }
    }

    /// Spawn the sweep loop
    pub fn start(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        info!("Starting queue cleanup task ({}s interval)", every.as_secs());

        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }
}
