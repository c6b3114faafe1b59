//! Main application configuration
//!
//! This module defines the primary configuration structures for the parlor-duel
//! matchmaking service, including environment variable and TOML file loading
//! and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the HTTP server binds to
    pub http_host: String,
    /// Port for matchmaking, health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Which queue/match store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single-lock transactional store
    Memory,
    /// Per-row compare-and-set store without multi-row transactions
    Sharded,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "sharded" => Ok(StorageBackend::Sharded),
            other => Err(anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Sharded => write!(f, "sharded"),
        }
    }
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Maximum skill difference for a compatible opponent
    pub skill_range: i64,
    /// Searching rows older than this are ignored for matching
    pub match_window_seconds: u64,
    /// Searching rows older than this are purged by the cleaner
    pub stale_after_seconds: u64,
    /// Cleaner sweep interval in seconds
    pub cleanup_interval_seconds: u64,
    /// Interval between matching attempts of one notification session
    pub poll_interval_ms: u64,
    /// Interval between keep-alive frames
    pub heartbeat_interval_seconds: u64,
    /// Skill assigned when a join request carries none
    pub default_skill_level: i64,
    /// Run a cleaner sweep before every join
    pub cleanup_on_join: bool,
    /// Storage backend
    pub storage_backend: StorageBackend,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "parlor-duel".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            skill_range: 200,
            match_window_seconds: 120,  // 2 minutes
            stale_after_seconds: 300,   // 5 minutes
            cleanup_interval_seconds: 60,
            poll_interval_ms: 2000,
            heartbeat_interval_seconds: 30,
            default_skill_level: 1000,
            cleanup_on_join: true,
            storage_backend: StorageBackend::Memory,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, target: &mut T) -> Result<()> {
    if let Ok(value) = env::var(key) {
        *target = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            config.service.http_host = host;
        }
        parse_env("HTTP_PORT", &mut config.service.http_port)?;
        parse_env(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut config.service.shutdown_timeout_seconds,
        )?;

        // Matchmaking settings
        let mm = &mut config.matchmaking;
        parse_env("SKILL_RANGE", &mut mm.skill_range)?;
        parse_env("MATCH_WINDOW_SECONDS", &mut mm.match_window_seconds)?;
        parse_env("STALE_AFTER_SECONDS", &mut mm.stale_after_seconds)?;
        parse_env("CLEANUP_INTERVAL_SECONDS", &mut mm.cleanup_interval_seconds)?;
        parse_env("POLL_INTERVAL_MS", &mut mm.poll_interval_ms)?;
        parse_env("HEARTBEAT_INTERVAL_SECONDS", &mut mm.heartbeat_interval_seconds)?;
        parse_env("DEFAULT_SKILL_LEVEL", &mut mm.default_skill_level)?;
        parse_env("CLEANUP_ON_JOIN", &mut mm.cleanup_on_join)?;
        parse_env("STORAGE_BACKEND", &mut mm.storage_backend)?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get cleanup interval as Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.cleanup_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    let mm = &config.matchmaking;
    if mm.skill_range < 0 {
        return Err(anyhow!("Skill range cannot be negative"));
    }
    if mm.match_window_seconds == 0 {
        return Err(anyhow!("Match window must be greater than 0"));
    }
    if mm.stale_after_seconds < mm.match_window_seconds {
        return Err(anyhow!(
            "Stale threshold ({}s) must not be shorter than the match window ({}s)",
            mm.stale_after_seconds,
            mm.match_window_seconds
        ));
    }
    if mm.cleanup_interval_seconds == 0 {
        return Err(anyhow!("Cleanup interval must be greater than 0"));
    }
    if mm.poll_interval_ms == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }
    if mm.heartbeat_interval_seconds == 0 {
        return Err(anyhow!("Heartbeat interval must be greater than 0"));
    }
    if mm.default_skill_level <= 0 {
        return Err(anyhow!("Default skill level must be positive"));
    }

    Ok(())
}
