//! Runtime matching and session configuration

use crate::config::app::MatchmakingSettings;
use crate::types::SkillLevel;
use chrono::Duration;

/// Policy constants used by the matcher and cleaner
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Maximum skill difference (inclusive) between opponents
    pub skill_range: SkillLevel,
    /// Candidates created before `now - match_window` are ignored
    pub match_window: Duration,
    /// Searching rows created before `now - stale_after` are purged
    pub stale_after: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            skill_range: 200,
            match_window: Duration::minutes(2),
            stale_after: Duration::minutes(5),
        }
    }
}

impl From<&MatchmakingSettings> for MatchingConfig {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            skill_range: settings.skill_range,
            match_window: Duration::seconds(settings.match_window_seconds as i64),
            stale_after: Duration::seconds(settings.stale_after_seconds as i64),
        }
    }
}

/// Timers of a notification session
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub poll_interval: std::time::Duration,
    pub heartbeat_interval: std::time::Duration,
    /// Buffered events per session before emission waits on the client
    pub buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(2),
            heartbeat_interval: std::time::Duration::from_secs(30),
            buffer_size: 16,
        }
    }
}

impl From<&MatchmakingSettings> for ChannelConfig {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            poll_interval: std::time::Duration::from_millis(settings.poll_interval_ms),
            heartbeat_interval: std::time::Duration::from_secs(settings.heartbeat_interval_seconds),
            ..Self::default()
        }
    }
}
