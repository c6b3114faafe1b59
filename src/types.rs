//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for players, supplied by the caller
pub type PlayerId = String;

/// Unique identifier for committed matches
pub type MatchId = String;

/// Integer skill rating used for compatibility checks
pub type SkillLevel = i64;

/// Queue status of a player row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Searching,
    Matched,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Searching => write!(f, "searching"),
            QueueStatus::Matched => write!(f, "matched"),
        }
    }
}

/// One row per waiting or matched player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub skill_level: SkillLevel,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub match_id: Option<MatchId>,
    pub matched_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Fresh searching row
    pub fn searching(
        player_id: impl Into<PlayerId>,
        player_name: impl Into<String>,
        skill_level: SkillLevel,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            skill_level,
            status: QueueStatus::Searching,
            created_at,
            match_id: None,
            matched_at: None,
        }
    }

    pub fn is_searching(&self) -> bool {
        self.status == QueueStatus::Searching
    }

    /// Transition searching -> matched
    pub(crate) fn mark_matched(&mut self, match_id: &str, now: DateTime<Utc>) {
        self.status = QueueStatus::Matched;
        self.match_id = Some(match_id.to_string());
        self.matched_at = Some(now);
    }

    /// Undo `mark_matched` for a pair commit that did not complete
    pub(crate) fn reset_to_searching(&mut self) {
        self.status = QueueStatus::Searching;
        self.match_id = None;
        self.matched_at = None;
    }

    /// Display snapshot handed to the opponent
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            skill_level: self.skill_level,
        }
    }
}

/// Lifecycle status of a committed match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
}

/// One row per committed pairing; `player1_id < player2_id` always holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub match_id: MatchId,
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub status: MatchStatus,
    pub started_at: DateTime<Utc>,
}

impl Match {
    /// The other participant, or `None` if `player_id` is not part of this match
    pub fn opponent_of(&self, player_id: &str) -> Option<&str> {
        if self.player1_id == player_id {
            Some(&self.player2_id)
        } else if self.player2_id == player_id {
            Some(&self.player1_id)
        } else {
            None
        }
    }
}

/// Opponent details shown to a matched player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub player_id: PlayerId,
    pub player_name: String,
    pub skill_level: SkillLevel,
}

/// Rank and wait time of a searching player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePosition {
    pub position: u64,
    pub total: u64,
    pub wait_time_ms: u64,
}

/// Result of a single matching attempt
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The player has no queue row; polling should stop
    NotFound,
    /// A match already exists for the player (re-poll after commit)
    AlreadyMatched {
        match_id: MatchId,
        opponent: Option<PlayerSnapshot>,
    },
    /// No match yet
    Searching,
    /// This attempt committed a new match
    Matched {
        match_id: MatchId,
        opponent: PlayerSnapshot,
    },
}

impl MatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MatchOutcome::NotFound => "not_found",
            MatchOutcome::AlreadyMatched { .. } => "already_matched",
            MatchOutcome::Searching => "searching",
            MatchOutcome::Matched { .. } => "matched",
        }
    }
}

/// Player details supplied on join
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
}

/// Request to join the matchmaking queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default)]
    pub player_id: PlayerId,
    #[serde(default)]
    pub player_data: Option<PlayerData>,
}

impl JoinRequest {
    pub fn new(player_id: impl Into<PlayerId>, player_name: impl Into<String>, skill: SkillLevel) -> Self {
        Self {
            player_id: player_id.into(),
            player_data: Some(PlayerData {
                player_name: player_name.into(),
                skill_level: Some(skill),
            }),
        }
    }
}

/// Request to leave the matchmaking queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    pub player_id: PlayerId,
}

/// Events streamed to one connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    #[serde(rename_all = "camelCase")]
    Connected { player_id: PlayerId },
    #[serde(rename_all = "camelCase")]
    Searching {
        position: u64,
        total: u64,
        wait_time_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    MatchFound {
        match_id: MatchId,
        opponent: Option<PlayerSnapshot>,
    },
    Error { message: String },
    /// Keep-alive frame with no payload
    KeepAlive,
}

impl NotificationEvent {
    /// Whether the stream ends after this event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationEvent::MatchFound { .. } | NotificationEvent::Error { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::Connected { .. } => "connected",
            NotificationEvent::Searching { .. } => "searching",
            NotificationEvent::MatchFound { .. } => "match_found",
            NotificationEvent::Error { .. } => "error",
            NotificationEvent::KeepAlive => "keep_alive",
        }
    }
}

impl From<QueuePosition> for NotificationEvent {
    fn from(position: QueuePosition) -> Self {
        NotificationEvent::Searching {
            position: position.position,
            total: position.total,
            wait_time_ms: position.wait_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_opponent_lookup() {
        let m = Match {
            match_id: "match_alice_bob_1".to_string(),
            player1_id: "alice".to_string(),
            player2_id: "bob".to_string(),
            status: MatchStatus::Active,
            started_at: Utc::now(),
        };

        assert_eq!(m.opponent_of("alice"), Some("bob"));
        assert_eq!(m.opponent_of("bob"), Some("alice"));
        assert_eq!(m.opponent_of("carol"), None);
    }

    #[test]
    fn test_event_wire_format() {
        let searching = NotificationEvent::Searching {
            position: 2,
            total: 5,
            wait_time_ms: 1500,
        };
        assert_eq!(
            serde_json::to_value(&searching).unwrap(),
            json!({"type": "searching", "position": 2, "total": 5, "waitTimeMs": 1500})
        );

        let found = NotificationEvent::MatchFound {
            match_id: "match_a_b_1".to_string(),
            opponent: Some(PlayerSnapshot {
                player_id: "b".to_string(),
                player_name: "Bob".to_string(),
                skill_level: 1050,
            }),
        };
        assert_eq!(
            serde_json::to_value(&found).unwrap(),
            json!({
                "type": "match_found",
                "matchId": "match_a_b_1",
                "opponent": {"playerId": "b", "playerName": "Bob", "skillLevel": 1050}
            })
        );
        assert!(found.is_terminal());
        assert!(!searching.is_terminal());
    }

    #[test]
    fn test_join_request_deserialization() {
        let request: JoinRequest = serde_json::from_value(json!({
            "playerId": "p1",
            "playerData": {"playerName": "Ann", "skillLevel": 1200}
        }))
        .unwrap();

        assert_eq!(request.player_id, "p1");
        let data = request.player_data.unwrap();
        assert_eq!(data.player_name, "Ann");
        assert_eq!(data.skill_level, Some(1200));

        let missing: JoinRequest = serde_json::from_value(json!({"playerId": "p2"})).unwrap();
        assert!(missing.player_data.is_none());
    }
}
