//! Pairing algorithm
//!
//! Each poll of a searching player looks for the oldest compatible opponent
//! and, if this side wins the tie-break, commits the pair with a single
//! conditional write. Concurrent pollers never need a shared lock: both sides
//! compute the same writer from the two ids, and the conditional update
//! re-checks that both rows are still searching at write time.

use crate::config::MatchingConfig;
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::store::{CandidateQuery, MatchStore, QueueStore};
use crate::types::{MatchOutcome, QueueEntry};
use crate::utils::{current_timestamp, generate_match_id, sorted_pair};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Finds and commits head-to-head matches
#[derive(Clone)]
pub struct Matcher {
    queue: Arc<dyn QueueStore>,
    matches: Arc<dyn MatchStore>,
    config: MatchingConfig,
    metrics: Arc<MetricsCollector>,
}

impl Matcher {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        matches: Arc<dyn MatchStore>,
        config: MatchingConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queue,
            matches,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Run one matching attempt for `player_id` at the current instant
    pub async fn attempt(&self, player_id: &str) -> Result<MatchOutcome> {
        self.attempt_at(player_id, current_timestamp()).await
    }

    /// Run one matching attempt for `player_id` as of `now`
    pub async fn attempt_at(&self, player_id: &str, now: DateTime<Utc>) -> Result<MatchOutcome> {
        let timer = self.metrics.start_timer();
        let result = self.resolve(player_id, now).await;

        match &result {
            Ok(outcome) => self.metrics.record_attempt(outcome, timer.stop()),
            Err(e) => {
                self.metrics.record_storage_error("attempt");
                warn!("Matching attempt for '{}' failed: {}", player_id, e);
            }
        }

        result
    }

    async fn resolve(&self, player_id: &str, now: DateTime<Utc>) -> Result<MatchOutcome> {
        let Some(entry) = self.queue.get(player_id).await? else {
            return Ok(MatchOutcome::NotFound);
        };

        if !entry.is_searching() {
            return self.already_matched(&entry).await;
        }

        let query = self.candidate_query(&entry, now);
        let Some(opponent) = self.queue.oldest_candidate(&query).await? else {
            return Ok(MatchOutcome::Searching);
        };

        // Only the lexicographically smaller id writes; the other side sees
        // the match through `already_matched` on a later poll.
        if entry.player_id >= opponent.player_id {
            debug!(
                "'{}' defers commit to opponent '{}'",
                entry.player_id, opponent.player_id
            );
            self.metrics.record_tie_break_deferral();
            return Ok(MatchOutcome::Searching);
        }

        self.commit(&entry, &opponent, now).await
    }

    fn candidate_query(&self, entry: &QueueEntry, now: DateTime<Utc>) -> CandidateQuery {
        CandidateQuery {
            exclude_player_id: entry.player_id.clone(),
            min_skill: entry.skill_level.saturating_sub(self.config.skill_range),
            max_skill: entry.skill_level.saturating_add(self.config.skill_range),
            created_since: now - self.config.match_window,
        }
    }

    /// Resolve the match a re-polling player already belongs to
    async fn already_matched(&self, entry: &QueueEntry) -> Result<MatchOutcome> {
        let Some(match_id) = entry.match_id.as_deref() else {
            warn!("Player '{}' is matched without a match id", entry.player_id);
            return Ok(MatchOutcome::Searching);
        };

        let Some(record) = self.matches.get(match_id).await? else {
            // Pair update is visible but the match row is not written yet
            debug!("Match {} not yet visible for '{}'", match_id, entry.player_id);
            return Ok(MatchOutcome::Searching);
        };

        let opponent_id = record.opponent_of(&entry.player_id).ok_or_else(|| {
            MatchmakingError::InternalError {
                message: format!(
                    "Player '{}' is not a participant of match {}",
                    entry.player_id, match_id
                ),
            }
        })?;

        let opponent = self
            .queue
            .get(opponent_id)
            .await?
            .map(|row| row.snapshot());

        Ok(MatchOutcome::AlreadyMatched {
            match_id: record.match_id,
            opponent,
        })
    }

    /// Commit `entry` against `opponent`; `entry` holds the smaller id
    async fn commit(
        &self,
        entry: &QueueEntry,
        opponent: &QueueEntry,
        now: DateTime<Utc>,
    ) -> Result<MatchOutcome> {
        let (lo, hi) = sorted_pair(&entry.player_id, &opponent.player_id);
        let match_id = generate_match_id(lo, hi, now);

        let updated = self
            .queue
            .conditional_pair_update(lo, hi, &match_id, now)
            .await?;

        if updated != 2 {
            info!(
                "Lost pairing race for {} vs {} (updated {} rows)",
                lo, hi, updated
            );
            self.metrics.record_pairing_conflict();
            return Ok(MatchOutcome::Searching);
        }

        if let Err(e) = self.matches.create(&match_id, lo, hi, now).await {
            error!("Failed to record match {}: {}", match_id, e);
            if let Err(revert_err) = self.queue.revert_pair_update(lo, hi, &match_id).await {
                error!(
                    "Failed to revert pair update for match {}: {}",
                    match_id, revert_err
                );
            }
            return Err(e);
        }

        self.metrics
            .record_match_created((now - entry.created_at).to_std().unwrap_or_default());
        info!(
            "Created match {} between '{}' ({}) and '{}' ({})",
            match_id, entry.player_id, entry.skill_level, opponent.player_id, opponent.skill_level
        );

        Ok(MatchOutcome::Matched {
            match_id,
            opponent: opponent.snapshot(),
        })
    }
}
