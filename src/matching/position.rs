//! Queue position and wait time

use crate::error::Result;
use crate::store::QueueStore;
use crate::types::QueuePosition;
use crate::utils::{current_timestamp, elapsed_ms};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Derives a player's rank among searching players from queue state
#[derive(Clone)]
pub struct PositionTracker {
    queue: Arc<dyn QueueStore>,
}

impl PositionTracker {
    pub fn new(queue: Arc<dyn QueueStore>) -> Self {
        Self { queue }
    }

    pub async fn position(&self, player_id: &str) -> Result<QueuePosition> {
        self.position_at(player_id, current_timestamp()).await
    }

    /// Rank is one plus the number of searching rows that joined earlier.
    /// An unknown player yields an all-zero position.
    pub async fn position_at(&self, player_id: &str, now: DateTime<Utc>) -> Result<QueuePosition> {
        let Some(entry) = self.queue.get(player_id).await? else {
            return Ok(QueuePosition::default());
        };

        let ahead = self.queue.count_searching_before(entry.created_at).await?;
        let total = self.queue.count_searching().await?;

        Ok(QueuePosition {
            position: ahead + 1,
            total,
            wait_time_ms: elapsed_ms(entry.created_at, now),
        })
    }
}
