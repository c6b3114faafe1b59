//! In-memory transactional store
//!
//! Both tables live behind one `RwLock`, so every multi-row write (including
//! `conditional_pair_update`) is a single critical section.

use crate::error::{MatchmakingError, Result};
use crate::store::{fifo_key, CandidateQuery, MatchStore, QueueStore};
use crate::types::{Match, MatchId, MatchStatus, PlayerId, QueueEntry, SkillLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    queue: HashMap<PlayerId, QueueEntry>,
    matches: HashMap<MatchId, Match>,
}

/// Single-lock store implementing both [`QueueStore`] and [`MatchStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| MatchmakingError::storage("Failed to acquire store read lock").into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| MatchmakingError::storage("Failed to acquire store write lock").into())
    }

    /// Insert a row as-is (backdated fixtures, imports)
    pub fn insert_entry(&self, entry: QueueEntry) -> Result<()> {
        let mut tables = self.write()?;
        tables.queue.insert(entry.player_id.clone(), entry);
        Ok(())
    }

    /// Snapshot of every committed match (for admin/debugging)
    pub fn all_matches(&self) -> Result<Vec<Match>> {
        Ok(self.read()?.matches.values().cloned().collect())
    }

    /// Snapshot of every queue row (for admin/debugging)
    pub fn all_entries(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.read()?.queue.values().cloned().collect())
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn enqueue(
        &self,
        player_id: &str,
        player_name: &str,
        skill_level: SkillLevel,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let entry = QueueEntry::searching(player_id, player_name, skill_level, now);
        let mut tables = self.write()?;
        tables.queue.remove(player_id);
        tables.queue.insert(player_id.to_string(), entry.clone());
        Ok(entry)
    }

    async fn dequeue(&self, player_id: &str) -> Result<bool> {
        Ok(self.write()?.queue.remove(player_id).is_some())
    }

    async fn get(&self, player_id: &str) -> Result<Option<QueueEntry>> {
        Ok(self.read()?.queue.get(player_id).cloned())
    }

    async fn oldest_candidate(&self, query: &CandidateQuery) -> Result<Option<QueueEntry>> {
        let tables = self.read()?;
        Ok(tables
            .queue
            .values()
            .filter(|entry| query.admits(entry))
            .min_by(|a, b| fifo_key(a).cmp(&fifo_key(b)))
            .cloned())
    }

    async fn count_searching_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let tables = self.read()?;
        Ok(tables
            .queue
            .values()
            .filter(|entry| entry.is_searching() && entry.created_at < before)
            .count() as u64)
    }

    async fn count_searching(&self) -> Result<u64> {
        let tables = self.read()?;
        Ok(tables.queue.values().filter(|e| e.is_searching()).count() as u64)
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

        let mut tables = self.write()?;
        let both_searching = [id_a, id_b]
            .into_iter()
            .all(|id| tables.queue.get(id).is_some_and(QueueEntry::is_searching));

        if !both_searching {
            return Ok(0);
        }

        for id in [id_a, id_b] {
            if let Some(entry) = tables.queue.get_mut(id) {
                entry.mark_matched(match_id, now);
            }
        }
        Ok(2)
    }

    async fn revert_pair_update(&self, id_a: &str, id_b: &str, match_id: &str) -> Result<u8> {
        let mut tables = self.write()?;
        let mut reverted = 0;
        for id in [id_a, id_b] {
            if let Some(entry) = tables.queue.get_mut(id) {
                if entry.match_id.as_deref() == Some(match_id) {
                    entry.reset_to_searching();
                    reverted += 1;
                }
            }
        }
        Ok(reverted)
    }

    async fn purge_searching_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.write()?;
        let before = tables.queue.len();
        tables
            .queue
            .retain(|_, entry| !(entry.is_searching() && entry.created_at < cutoff));
        Ok((before - tables.queue.len()) as u64)
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn create(
        &self,
        match_id: &str,
        player1_id: &str,
        player2_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Match> {
        let mut tables = self.write()?;
        if tables.matches.contains_key(match_id) {
            return Err(MatchmakingError::Conflict {
                message: format!("Match {} already exists", match_id),
            }
            .into());
        }

        let record = Match {
            match_id: match_id.to_string(),
            player1_id: player1_id.to_string(),
            player2_id: player2_id.to_string(),
            status: MatchStatus::Active,
            started_at: now,
        };
        tables.matches.insert(match_id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, match_id: &str) -> Result<Option<Match>> {
        Ok(self.read()?.matches.get(match_id).cloned())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.matches.len() as u64)
    }
}
