//! Metrics and monitoring for the parlor-duel matchmaking service
//!
//! This module provides Prometheus metrics collection for queue, matching
//! and notification-session activity. The HTTP exposition lives in
//! [`crate::http::health`].

pub mod collector;

pub use collector::{
    MatchMetrics, MetricsCollector, MetricsTimer, QueueMetrics, ServiceMetrics, SessionMetrics,
};
