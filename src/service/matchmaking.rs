//! Matchmaking service façade
//!
//! This is the surface used by the request-routing layer: join, cancel and
//! open a notification channel. It validates requests before any storage is
//! touched. Open sessions live in the channel's registry so a cancel can
//! close them.

use crate::config::{ChannelConfig, MatchingConfig, MatchmakingSettings, StorageBackend};
use crate::error::{MatchmakingError, Result};
use crate::matching::{Cleaner, Matcher, PositionTracker};
use crate::metrics::MetricsCollector;
use crate::notify::{NotificationChannel, NotificationSession, SessionRegistry};
use crate::store::{InMemoryStore, MatchStore, QueueStore, ShardedStore};
use crate::types::{JoinRequest, QueueEntry, SkillLevel};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Display name used when a join carries none
pub const ANONYMOUS_PLAYER_NAME: &str = "Anonymous";

/// Statistics about matchmaking activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchmakingStats {
    /// Players currently searching
    pub players_searching: u64,
    /// Matches committed since start
    pub matches_created: u64,
    /// Open notification sessions
    pub active_sessions: usize,
}

/// The matchmaking core wired to one storage backend
pub struct MatchmakingService {
    queue: Arc<dyn QueueStore>,
    matches: Arc<dyn MatchStore>,
    matcher: Matcher,
    tracker: PositionTracker,
    cleaner: Arc<Cleaner>,
    channel: NotificationChannel,
    settings: MatchmakingSettings,
    metrics: Arc<MetricsCollector>,
    sessions: Arc<SessionRegistry>,
}

impl MatchmakingService {
    /// Create a service over separate queue and match stores
    pub fn new(
        queue: Arc<dyn QueueStore>,
        matches: Arc<dyn MatchStore>,
        settings: MatchmakingSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let matching = MatchingConfig::from(&settings);
        let matcher = Matcher::new(
            queue.clone(),
            matches.clone(),
            matching.clone(),
            metrics.clone(),
        );
        let tracker = PositionTracker::new(queue.clone());
        let cleaner = Arc::new(Cleaner::new(
            queue.clone(),
            matching.stale_after,
            metrics.clone(),
        ));
        let channel = NotificationChannel::new(
            matcher.clone(),
            tracker.clone(),
            ChannelConfig::from(&settings),
            metrics.clone(),
        );

        Self {
            queue,
            matches,
            matcher,
            tracker,
            cleaner,
            sessions: channel.registry(),
            channel,
            settings,
            metrics,
        }
    }

    /// Create a service over a store that holds both tables
    pub fn with_store<S>(
        store: Arc<S>,
        settings: MatchmakingSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self
    where
        S: QueueStore + MatchStore + 'static,
    {
        Self::new(store.clone(), store, settings, metrics)
    }

    /// Create a service over the backend named in `settings`
    pub fn from_settings(settings: MatchmakingSettings, metrics: Arc<MetricsCollector>) -> Self {
        metrics.set_storage_backend(&settings.storage_backend.to_string());
        match settings.storage_backend {
            StorageBackend::Memory => {
                Self::with_store(Arc::new(InMemoryStore::new()), settings, metrics)
            }
            StorageBackend::Sharded => {
                Self::with_store(Arc::new(ShardedStore::new()), settings, metrics)
            }
        }
    }

    /// Validate a join request and (re)insert the player as searching
    pub async fn join_queue(&self, request: JoinRequest) -> Result<QueueEntry> {
        let player_id = require_player_id(&request.player_id)?;
        let data = request
            .player_data
            .ok_or_else(|| MatchmakingError::invalid_input("playerData is required"))?;

        let skill_level = self.resolve_skill(data.skill_level)?;
        let player_name = match data.player_name.trim() {
            "" => ANONYMOUS_PLAYER_NAME,
            name => name,
        };

        if self.settings.cleanup_on_join {
            self.cleaner.sweep().await;
        }

        let entry = self
            .queue
            .enqueue(player_id, player_name, skill_level, current_timestamp())
            .await?;
        self.metrics.record_player_queued();

        info!(
            "Player '{}' ({}) joined queue with skill {}",
            entry.player_id, entry.player_name, entry.skill_level
        );
        Ok(entry)
    }

    fn resolve_skill(&self, requested: Option<SkillLevel>) -> Result<SkillLevel> {
        match requested {
            Some(skill) if skill < 0 => {
                Err(MatchmakingError::invalid_input("skillLevel must not be negative").into())
            }
            None | Some(0) => Ok(self.settings.default_skill_level),
            Some(skill) => Ok(skill),
        }
    }

    /// Close the player's sessions and remove their queue row.
    /// Returns whether a row existed.
    pub async fn cancel_queue(&self, player_id: &str) -> Result<bool> {
        let player_id = require_player_id(player_id)?;

        let handles = self.sessions.take_player(player_id);
        for handle in &handles {
            handle.cancel();
        }

        let removed = self.queue.dequeue(player_id).await?;
        self.metrics.record_player_cancelled();

        info!(
            "Player '{}' left queue (row removed: {}, sessions closed: {})",
            player_id,
            removed,
            handles.len()
        );
        Ok(removed)
    }

    /// Open an event stream for `player_id`
    pub fn open_notification_channel(&self, player_id: &str) -> Result<NotificationSession> {
        let player_id = require_player_id(player_id)?;
        let session = self.channel.open(player_id);
        debug!(
            "Opened notification session for '{}' ({} open overall)",
            player_id,
            self.sessions.active()
        );

        Ok(session)
    }

    /// Cancel every registered session; returns how many were still open
    pub fn close_all_sessions(&self) -> usize {
        self.sessions
            .drain()
            .iter()
            .filter(|handle| !handle.is_closed())
            .inspect(|handle| handle.cancel())
            .count()
    }

    /// Open sessions across all players
    pub fn active_sessions(&self) -> usize {
        self.sessions.active()
    }

    /// Registry of sessions that have not ended yet
    pub fn session_registry(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub async fn stats(&self) -> Result<MatchmakingStats> {
        let players_searching = self.queue.count_searching().await?;
        self.metrics.update_players_searching(players_searching);

        Ok(MatchmakingStats {
            players_searching,
            matches_created: self.matches.count().await?,
            active_sessions: self.active_sessions(),
        })
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn cleaner(&self) -> Arc<Cleaner> {
        self.cleaner.clone()
    }

    pub fn queue_store(&self) -> Arc<dyn QueueStore> {
        self.queue.clone()
    }

    pub fn match_store(&self) -> Arc<dyn MatchStore> {
        self.matches.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn settings(&self) -> &MatchmakingSettings {
        &self.settings
    }
}

fn require_player_id(player_id: &str) -> Result<&str> {
    let trimmed = player_id.trim();
    if trimmed.is_empty() {
        return Err(MatchmakingError::invalid_input("playerId is required").into());
    }
    Ok(trimmed)
}
