//! Sharded store with per-row compare-and-set
//!
//! Rows are locked individually and there is no multi-row transaction, so the
//! pair update is emulated: compare-and-set the first row, compare-and-set the
//! second, and roll the first back if the second fails. At no point are two
//! row locks held together.

use crate::error::{MatchmakingError, Result};
use crate::store::{fifo_key, CandidateQuery, MatchStore, QueueStore};
use crate::types::{Match, MatchId, MatchStatus, PlayerId, QueueEntry, SkillLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Store backed by two concurrent hash maps
#[derive(Debug, Default)]
pub struct ShardedStore {
    queue: DashMap<PlayerId, QueueEntry>,
    matches: DashMap<MatchId, Match>,
}

impl ShardedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row as-is (backdated fixtures, imports)
    pub fn insert_entry(&self, entry: QueueEntry) {
        self.queue.insert(entry.player_id.clone(), entry);
    }

    /// Snapshot of every committed match (for admin/debugging)
    pub fn all_matches(&self) -> Vec<Match> {
        self.matches.iter().map(|m| m.value().clone()).collect()
    }

    /// Set one row searching -> matched if it is still searching
    fn compare_and_match(&self, player_id: &str, match_id: &str, now: DateTime<Utc>) -> bool {
        match self.queue.get_mut(player_id) {
            Some(mut entry) if entry.is_searching() => {
                entry.mark_matched(match_id, now);
                true
            }
            _ => false,
        }
    }

    /// Reset one row to searching if it still carries `match_id`
    fn compare_and_reset(&self, player_id: &str, match_id: &str) -> bool {
        match self.queue.get_mut(player_id) {
            Some(mut entry) if entry.match_id.as_deref() == Some(match_id) => {
                entry.reset_to_searching();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl QueueStore for ShardedStore {
    async fn enqueue(
        &self,
        player_id: &str,
        player_name: &str,
        skill_level: SkillLevel,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let entry = QueueEntry::searching(player_id, player_name, skill_level, now);
        self.queue.insert(player_id.to_string(), entry.clone());
        Ok(entry)
    }

    async fn dequeue(&self, player_id: &str) -> Result<bool> {
        Ok(self.queue.remove(player_id).is_some())
    }

    async fn get(&self, player_id: &str) -> Result<Option<QueueEntry>> {
        Ok(self.queue.get(player_id).map(|entry| entry.value().clone()))
    }

    async fn oldest_candidate(&self, query: &CandidateQuery) -> Result<Option<QueueEntry>> {
        Ok(self
            .queue
            .iter()
            .filter(|entry| query.admits(entry.value()))
            .map(|entry| entry.value().clone())
            .min_by(|a, b| fifo_key(a).cmp(&fifo_key(b))))
    }

    async fn count_searching_before(&self, before: DateTime<Utc>) -> Result<u64> {
        Ok(self
            .queue
            .iter()
            .filter(|entry| entry.is_searching() && entry.created_at < before)
            .count() as u64)
    }

    async fn count_searching(&self) -> Result<u64> {
        Ok(self.queue.iter().filter(|entry| entry.is_searching()).count() as u64)
    }

    async fn conditional_pair_update(
        &self,
        id_a: &str,
        id_b: &str,
        match_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u8> {
        if id_a == id_b {
            return Err(MatchmakingError::invalid_input("A player cannot be paired with itself").into());
        }

        if !self.compare_and_match(id_a, match_id, now) {
            return Ok(0);
        }

        if !self.compare_and_match(id_b, match_id, now) {
            let rolled_back = self.compare_and_reset(id_a, match_id);
            debug!(
                "Pair update {} failed on '{}', rolled back '{}': {}",
                match_id, id_b, id_a, rolled_back
            );
            return Ok(0);
        }

        Ok(2)
    }

    async fn revert_pair_update(&self, id_a: &str, id_b: &str, match_id: &str) -> Result<u8> {
        let reverted = [id_a, id_b]
            .into_iter()
            .filter(|id| self.compare_and_reset(id, match_id))
            .count();
        Ok(reverted as u8)
    }

    async fn purge_searching_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut purged = 0u64;
        self.queue.retain(|_, entry| {
            let stale = entry.is_searching() && entry.created_at < cutoff;
            if stale {
                purged += 1;
            }
            !stale
        });
        Ok(purged)
    }
}

#[async_trait]
impl MatchStore for ShardedStore {
    async fn create(
        &self,
        match_id: &str,
        player1_id: &str,
        player2_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Match> {
        match self.matches.entry(match_id.to_string()) {
            Entry::Occupied(_) => Err(MatchmakingError::Conflict {
                message: format!("Match {} already exists", match_id),
            }
            .into()),
            Entry::Vacant(slot) => {
                let record = Match {
                    match_id: match_id.to_string(),
                    player1_id: player1_id.to_string(),
                    player2_id: player2_id.to_string(),
                    status: MatchStatus::Active,
                    started_at: now,
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get(&self, match_id: &str) -> Result<Option<Match>> {
        Ok(self.matches.get(match_id).map(|m| m.value().clone()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.matches.len() as u64)
    }
}
