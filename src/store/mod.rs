//! Queue and match storage
//!
//! The matcher only relies on the operations defined by [`QueueStore`] and
//! [`MatchStore`]. `conditional_pair_update` is the single optimistic
//! concurrency primitive: it must be atomic with respect to every other writer.

pub mod memory;
pub mod sharded;

use crate::error::Result;
use crate::types::{Match, QueueEntry, SkillLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::InMemoryStore;
pub use sharded::ShardedStore;

/// Filter describing a compatible opponent for one searching player
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    /// The polling player, never a candidate for itself
    pub exclude_player_id: String,
    pub min_skill: SkillLevel,
    pub max_skill: SkillLevel,
    /// Rows created before this instant are too old to be matched
    pub created_since: DateTime<Utc>,
}

impl CandidateQuery {
    pub fn admits(&self, entry: &QueueEntry) -> bool {
        entry.is_searching()
            && entry.player_id != self.exclude_player_id
            && entry.skill_level >= self.min_skill
            && entry.skill_level <= self.max_skill
            && entry.created_at >= self.created_since
    }
}

/// FIFO order over candidates: oldest first, player id breaks ties
pub(crate) fn fifo_key(entry: &QueueEntry) -> (DateTime<Utc>, &str) {
    (entry.created_at, entry.player_id.as_str())
}

/// Storage of waiting and matched players
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Replace any row for `player_id` with a fresh searching row created at `now`
    async fn enqueue(
        &self,
        player_id: &str,
        player_name: &str,
        skill_level: SkillLevel,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry>;

    /// Delete the row for `player_id`; returns whether one existed
    async fn dequeue(&self, player_id: &str) -> Result<bool>;

    async fn get(&self, player_id: &str) -> Result<Option<QueueEntry>>;

    /// Oldest row admitted by `query`
    async fn oldest_candidate(&self, query: &CandidateQuery) -> Result<Option<QueueEntry>>;

    /// Number of searching rows created strictly before `before`
    async fn count_searching_before(&self, before: DateTime<Utc>) -> Result<u64>;

    async fn count_searching(&self) -> Result<u64>;

    /// Mark both rows matched with `match_id`, but only if both are still searching.
    ///
    /// Returns the number of rows changed: 2 when both transitioned, otherwise
    /// 0 and neither row carries `match_id` afterwards.
    async fn conditional_pair_update(
        &self,
        id_a: &str,
        id_b: &str,
        match_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u8>;

    /// Compensate a pair update whose match record could not be written.
    /// Only rows still carrying `match_id` are reset to searching.
    async fn revert_pair_update(&self, id_a: &str, id_b: &str, match_id: &str) -> Result<u8>;

    /// Delete searching rows created strictly before `cutoff`
    async fn purge_searching_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Append-only storage of committed matches
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Insert a new match; fails with `Conflict` if `match_id` exists
    async fn create(
        &self,
        match_id: &str,
        player1_id: &str,
        player2_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Match>;

    async fn get(&self, match_id: &str) -> Result<Option<Match>>;

    async fn count(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn query(now: DateTime<Utc>) -> CandidateQuery {
        CandidateQuery {
            exclude_player_id: "alice".to_string(),
            min_skill: 800,
            max_skill: 1200,
            created_since: now - Duration::minutes(2),
        }
    }

    #[test]
    fn test_admits_rejects_self_matched_and_stale() {
        let now = Utc::now();
        let q = query(now);

        assert!(q.admits(&QueueEntry::searching("bob", "Bob", 1000, now)));
        assert!(!q.admits(&QueueEntry::searching("alice", "Alice", 1000, now)));

        let mut matched = QueueEntry::searching("bob", "Bob", 1000, now);
        matched.mark_matched("m1", now);
        assert!(!q.admits(&matched));

        let stale = QueueEntry::searching("bob", "Bob", 1000, now - Duration::seconds(121));
        assert!(!q.admits(&stale));

        let boundary = QueueEntry::searching("bob", "Bob", 1000, now - Duration::minutes(2));
        assert!(q.admits(&boundary));
    }

    proptest! {
        #[test]
        fn prop_admits_only_within_skill_band(skill in 0i64..3000) {
            let now = Utc::now();
            let q = query(now);
            let entry = QueueEntry::searching("bob", "Bob", skill, now);
            prop_assert_eq!(q.admits(&entry), (800..=1200).contains(&skill));
        }
    }
}
