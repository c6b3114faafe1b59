//! HTTP surface: matchmaking API, health probes and Prometheus metrics
//!
//! One axum router serves both the `/api/matchmaking/*` routes and the
//! operational endpoints. Shutdown is signalled over a broadcast channel.

pub mod health;
pub mod routes;

use crate::service::MatchmakingService;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for all handlers
#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<MatchmakingService>,
    pub service_name: String,
    pub running: Arc<RwLock<bool>>,
    pub started_at: Instant,
}

impl HttpState {
    pub fn new(service: Arc<MatchmakingService>, service_name: impl Into<String>) -> Self {
        Self {
            service,
            service_name: service_name.into(),
            running: Arc::new(RwLock::new(true)),
            started_at: Instant::now(),
        }
    }

    /// Share an externally owned running flag
    pub fn with_running_flag(mut self, running: Arc<RwLock<bool>>) -> Self {
        self.running = running;
        self
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Build the full router
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .merge(routes::router())
        .merge(health::router())
        .with_state(state)
}

/// HTTP server with graceful shutdown
pub struct HttpServer {
    config: HttpServerConfig,
    state: HttpState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: HttpState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind and serve until [`HttpServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid HTTP server address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("HTTP server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub fn stop(&self) {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to HTTP server: {}", e);
        }
    }
}
