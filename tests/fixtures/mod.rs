//! Test fixtures and store doubles for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parlor_duel::config::{MatchmakingSettings, StorageBackend};
use parlor_duel::error::{MatchmakingError, Result};
use parlor_duel::metrics::MetricsCollector;
use parlor_duel::service::MatchmakingService;
use parlor_duel::store::{CandidateQuery, InMemoryStore, MatchStore, QueueStore};
use parlor_duel::types::{Match, NotificationEvent, QueueEntry, SkillLevel};
use parlor_duel::NotificationSession;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Settings with short session timers so streams progress quickly in tests
pub fn fast_settings(backend: StorageBackend) -> MatchmakingSettings {
    MatchmakingSettings {
        poll_interval_ms: 20,
        heartbeat_interval_seconds: 3600,
        storage_backend: backend,
        ..MatchmakingSettings::default()
    }
}

pub fn build_service(backend: StorageBackend) -> Arc<MatchmakingService> {
    Arc::new(MatchmakingService::from_settings(
        fast_settings(backend),
        Arc::new(MetricsCollector::default()),
    ))
}

/// Read events until a terminal one arrives or the stream ends
pub async fn collect_until_terminal(
    session: &mut NotificationSession,
    within: Duration,
) -> Vec<NotificationEvent> {
    let mut events = Vec::new();
    let collect = async {
        while let Some(event) = session.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
    };
    tokio::time::timeout(within, collect)
        .await
        .expect("session did not reach a terminal event in time");
    events
}

/// In-memory store whose every operation can be switched to fail
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MatchmakingError::storage("store offline").into());
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn enqueue(
        &self,
        player_id: &str,
        player_name: &str,
        skill_level: SkillLevel,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        self.check()?;
        self.inner
            .enqueue(player_id, player_name, skill_level, now)
            .await
    }

    async fn dequeue(&self, player_id: &str) -> Result<bool> {
        self.check()?;
        self.inner.dequeue(player_id).await
    }

    async fn get(&self, player_id: &str) -> Result<Option<QueueEntry>> {
        self.check()?;
        QueueStore::get(&self.inner, player_id).await
    }

    async fn oldest_candidate(&self, query: &CandidateQuery) -> Result<Option<QueueEntry>> {
        self.check()?;
        self.inner.oldest_candidate(query).await
    }

    async fn count_searching_before(&self, before: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        self.inner.count_searching_before(before).await
    }

    async fn count_searching(&self) -> Result<u64> {
        self.check()?;
        self.inner.count_searching().await
    }

    async fn conditional_pair_update(
        &self,
        id_a: &str,
        id_b: &str,
        match_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u8> {
        self.check()?;
        self.inner
            .conditional_pair_update(id_a, id_b, match_id, now)
            .await
    }

    async fn revert_pair_update(&self, id_a: &str, id_b: &str, match_id: &str) -> Result<u8> {
        self.check()?;
        self.inner.revert_pair_update(id_a, id_b, match_id).await
    }

    async fn purge_searching_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        self.inner.purge_searching_before(cutoff).await
    }
}

#[async_trait]
impl MatchStore for FlakyStore {
    async fn create(
        &self,
        match_id: &str,
        player1_id: &str,
        player2_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Match> {
        self.check()?;
        self.inner
            .create(match_id, player1_id, player2_id, now)
            .await
    }

    async fn get(&self, match_id: &str) -> Result<Option<Match>> {
        self.check()?;
        MatchStore::get(&self.inner, match_id).await
    }

    async fn count(&self) -> Result<u64> {
        self.check()?;
        self.inner.count().await
    }
}
