//! Health check endpoints and Prometheus metrics
//!
//! `/`, `/health`, `/ready`, `/alive`, `/metrics` and `/stats`.

use crate::http::HttpState;
use crate::service::health::{HealthCheck, HealthStatus};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use tracing::{debug, error};

pub fn router() -> Router<HttpState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/matchmaking/join",
            "/api/matchmaking/cancel",
            "/api/matchmaking/events",
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats"
        ]
    }))
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<HttpState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = HealthCheck::liveness_check(state.is_running().await);
    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": state.service_name,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<HttpState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    let running = state.is_running().await;
    match HealthCheck::readiness_check(&state.service, running).await {
        HealthStatus::Healthy => (StatusCode::OK, "Ready"),
        HealthStatus::Degraded => (StatusCode::OK, "Degraded but ready"),
        HealthStatus::Unhealthy => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
    }
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<HttpState>) -> impl IntoResponse {
    match HealthCheck::liveness_check(state.is_running().await) {
        HealthStatus::Healthy => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HttpState>) -> impl IntoResponse {
    debug!("Metrics endpoint requested");

    let metrics = state.service.metrics();
    metrics.update_uptime(state.started_at.elapsed());

    let metric_families = metrics.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            body,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain".to_string())],
                "Failed to encode metrics".to_string(),
            )
        }
    }
}

/// Detailed service statistics endpoint handler
async fn stats_handler(State(state): State<HttpState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let running = state.is_running().await;
    match HealthCheck::check(
        &state.service,
        running,
        &state.service_name,
        state.started_at.elapsed(),
    )
    .await
    {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptimeSeconds": health.stats.uptime_seconds
                },
                "queue": {
                    "searching": health.stats.players_searching,
                    "activeSessions": health.stats.active_sessions
                },
                "matches": {
                    "created": health.stats.matches_created
                },
                "components": health.checks,
                "timestamp": health.timestamp
            })),
        ),
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": {
                        "name": state.service_name,
                        "version": env!("CARGO_PKG_VERSION"),
                        "status": "error"
                    },
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    }
}
