//! Service layer for the parlor-duel matchmaking service
//!
//! This module contains the matchmaking façade, the main application state,
//! health reporting and background task management for the production service.

pub mod app;
pub mod health;
pub mod matchmaking;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use matchmaking::{MatchmakingService, MatchmakingStats, ANONYMOUS_PLAYER_NAME};
