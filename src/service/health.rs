//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the parlor-duel
//! matchmaking service, including readiness and liveness probes.

use crate::service::matchmaking::MatchmakingService;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge encoding (0=unhealthy, 1=degraded, 2=healthy)
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Combine with a component status; the worse of the two wins
    fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.as_gauge() < self.as_gauge() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version (could be from environment)
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players currently searching
    pub players_searching: u64,
    /// Matches committed since start
    pub matches_created: u64,
    /// Open notification sessions
    pub active_sessions: usize,
    /// Service uptime in seconds
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(
        service: &MatchmakingService,
        running: bool,
        service_name: &str,
        uptime: Duration,
    ) -> Result<Self> {
        let mut checks = Vec::new();

        checks.push(Self::check_service_running(running));
        checks.push(Self::check_queue_store(service).await);
        checks.push(Self::check_match_store(service).await);

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

        let stats = match service.stats().await {
            Ok(stats) => ServiceStats {
                players_searching: stats.players_searching,
                matches_created: stats.matches_created,
                active_sessions: stats.active_sessions,
                uptime_seconds: uptime.as_secs(),
            },
            Err(e) => {
                error!("Failed to gather service stats: {}", e);
                ServiceStats {
                    uptime_seconds: uptime.as_secs(),
                    ..ServiceStats::default()
                }
            }
        };

        let metrics = service.metrics();
        metrics.update_health_status(status.as_gauge());
        metrics.update_uptime(uptime);

        Ok(HealthCheck {
            status,
            service: service_name.to_string(),
            version: std::env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub fn liveness_check(running: bool) -> HealthStatus {
        if running {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(service: &MatchmakingService, running: bool) -> HealthStatus {
        if !running {
            return HealthStatus::Unhealthy;
        }

        Self::check_queue_store(service).await.status
    }

    fn check_service_running(running: bool) -> ComponentCheck {
        let (status, message) = if running {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: 0,
        }
    }

    /// The queue store must answer a count; matching is impossible otherwise
    async fn check_queue_store(service: &MatchmakingService) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match service.queue_store().count_searching().await {
            Ok(count) => {
                debug!("Queue store healthy ({} searching)", count);
                (HealthStatus::Healthy, None)
            }
            Err(e) => {
                error!("Queue store check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Queue store unavailable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "queue_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// A failing match store still lets players queue, so it only degrades
    async fn check_match_store(service: &MatchmakingService) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match service.match_store().count().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Match store check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Match store unavailable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "match_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}
