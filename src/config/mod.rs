//! Configuration management for the parlor-duel service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values for the matchmaking service.

pub mod app;
pub mod matching;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, MatchmakingSettings, ServiceSettings, StorageBackend};
pub use matching::{ChannelConfig, MatchingConfig};
