//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the parlor-duel matchmaking
//! service using Prometheus metrics.

use crate::types::{MatchOutcome, NotificationEvent};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Match-related metrics
    match_metrics: MatchMetrics,

    /// Notification session metrics
    session_metrics: SessionMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Storage operation errors
    pub storage_errors_total: IntCounterVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total join requests accepted
    pub players_queued_total: IntCounter,

    /// Total cancel requests
    pub players_cancelled_total: IntCounter,

    /// Players currently searching (sampled on health checks)
    pub players_searching: IntGauge,

    /// Searching rows removed by the cleaner
    pub stale_entries_purged_total: IntCounter,

    /// Cleaner sweeps that failed
    pub cleanup_failures_total: IntCounter,
}

/// Match-related metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches committed
    pub matches_created_total: IntCounter,

    /// Pair updates that lost to a concurrent writer
    pub pairing_conflicts_total: IntCounter,

    /// Attempts that deferred to the opponent on the tie-break
    pub tie_break_deferrals_total: IntCounter,

    /// Time from join to match commit
    pub match_wait_time_seconds: Histogram,

    /// Matching attempt duration by outcome
    pub attempt_duration_seconds: HistogramVec,
}

/// Notification session metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Open notification sessions
    pub active_sessions: IntGauge,

    /// Closed sessions by terminal state
    pub sessions_closed_total: IntCounterVec,

    /// Emitted events by type
    pub events_emitted_total: IntCounterVec,

    /// Open sessions per terminal reason at close time
    pub session_duration_seconds: HistogramVec,

    /// Reserved per-instance gauge, labelled by backend
    pub storage_backend: IntGaugeVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            session_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn sessions(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Record the outcome of one matching attempt
    pub fn record_attempt(&self, outcome: &MatchOutcome, duration: Duration) {
        self.match_metrics
            .attempt_duration_seconds
            .with_label_values(&[outcome.label()])
            .observe(duration.as_secs_f64());
    }

    /// Record a committed match and how long the committing player waited
    pub fn record_match_created(&self, wait_time: Duration) {
        self.match_metrics.matches_created_total.inc();
        self.match_metrics
            .match_wait_time_seconds
            .observe(wait_time.as_secs_f64());
    }

    pub fn record_pairing_conflict(&self) {
        self.match_metrics.pairing_conflicts_total.inc();
    }

    pub fn record_tie_break_deferral(&self) {
        self.match_metrics.tie_break_deferrals_total.inc();
    }

    pub fn record_player_queued(&self) {
        self.queue_metrics.players_queued_total.inc();
    }

    pub fn record_player_cancelled(&self) {
        self.queue_metrics.players_cancelled_total.inc();
    }

    /// Record a cleaner sweep
    pub fn record_cleanup(&self, purged: Option<u64>) {
        match purged {
            Some(count) => self.queue_metrics.stale_entries_purged_total.inc_by(count),
            None => self.queue_metrics.cleanup_failures_total.inc(),
        }
    }

    pub fn record_storage_error(&self, operation: &str) {
        self.service_metrics
            .storage_errors_total
            .with_label_values(&[operation])
            .inc();
    }

    pub fn record_session_opened(&self) {
        self.session_metrics.active_sessions.inc();
    }

    pub fn record_session_closed(&self, reason: &str, duration: Duration) {
        self.session_metrics.active_sessions.dec();
        self.session_metrics
            .sessions_closed_total
            .with_label_values(&[reason])
            .inc();
        self.session_metrics
            .session_duration_seconds
            .with_label_values(&[reason])
            .observe(duration.as_secs_f64());
    }

    pub fn record_event_emitted(&self, event: &NotificationEvent) {
        self.session_metrics
            .events_emitted_total
            .with_label_values(&[event.kind()])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics.uptime_seconds.set(uptime.as_secs() as i64);
    }

    pub fn update_players_searching(&self, count: u64) {
        self.queue_metrics.players_searching.set(count as i64);
    }

    pub fn set_storage_backend(&self, backend: &str) {
        self.session_metrics
            .storage_backend
            .with_label_values(&[backend])
            .set(1);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("parlor_duel_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "parlor_duel_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let storage_errors_total = IntCounterVec::new(
            Opts::new("parlor_duel_storage_errors_total", "Storage operation errors"),
            &["operation"],
        )?;
        registry.register(Box::new(storage_errors_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            storage_errors_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_queued_total =
            IntCounter::new("parlor_duel_players_queued_total", "Total players queued")?;
        registry.register(Box::new(players_queued_total.clone()))?;

        let players_cancelled_total = IntCounter::new(
            "parlor_duel_players_cancelled_total",
            "Total players who cancelled",
        )?;
        registry.register(Box::new(players_cancelled_total.clone()))?;

        let players_searching = IntGauge::new(
            "parlor_duel_players_searching",
            "Players currently searching",
        )?;
        registry.register(Box::new(players_searching.clone()))?;

        let stale_entries_purged_total = IntCounter::new(
            "parlor_duel_stale_entries_purged_total",
            "Stale queue entries purged",
        )?;
        registry.register(Box::new(stale_entries_purged_total.clone()))?;

        let cleanup_failures_total = IntCounter::new(
            "parlor_duel_cleanup_failures_total",
            "Failed cleaner sweeps",
        )?;
        registry.register(Box::new(cleanup_failures_total.clone()))?;

        Ok(Self {
            players_queued_total,
            players_cancelled_total,
            players_searching,
            stale_entries_purged_total,
            cleanup_failures_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total =
            IntCounter::new("parlor_duel_matches_created_total", "Total matches created")?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let pairing_conflicts_total = IntCounter::new(
            "parlor_duel_pairing_conflicts_total",
            "Pair updates lost to a concurrent writer",
        )?;
        registry.register(Box::new(pairing_conflicts_total.clone()))?;

        let tie_break_deferrals_total = IntCounter::new(
            "parlor_duel_tie_break_deferrals_total",
            "Attempts deferred to the opponent by the tie-break",
        )?;
        registry.register(Box::new(tie_break_deferrals_total.clone()))?;

        let match_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "parlor_duel_match_wait_time_seconds",
                "Time from join to match",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        registry.register(Box::new(match_wait_time_seconds.clone()))?;

        let attempt_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "parlor_duel_attempt_duration_seconds",
                "Matching attempt duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(attempt_duration_seconds.clone()))?;

        Ok(Self {
            matches_created_total,
            pairing_conflicts_total,
            tie_break_deferrals_total,
            match_wait_time_seconds,
            attempt_duration_seconds,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_sessions = IntGauge::new(
            "parlor_duel_active_sessions",
            "Open notification sessions",
        )?;
        registry.register(Box::new(active_sessions.clone()))?;

        let sessions_closed_total = IntCounterVec::new(
            Opts::new(
                "parlor_duel_sessions_closed_total",
                "Closed notification sessions",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(sessions_closed_total.clone()))?;

        let events_emitted_total = IntCounterVec::new(
            Opts::new("parlor_duel_events_emitted_total", "Emitted session events"),
            &["type"],
        )?;
        registry.register(Box::new(events_emitted_total.clone()))?;

        let session_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "parlor_duel_session_duration_seconds",
                "Notification session lifetime",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["reason"],
        )?;
        registry.register(Box::new(session_duration_seconds.clone()))?;

        let storage_backend = IntGaugeVec::new(
            Opts::new("parlor_duel_storage_backend", "Configured storage backend"),
            &["backend"],
        )?;
        registry.register(Box::new(storage_backend.clone()))?;

        Ok(Self {
            active_sessions,
            sessions_closed_total,
            events_emitted_total,
            session_duration_seconds,
            storage_backend,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
