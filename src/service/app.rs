//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the matchmaking
//! service to its storage backend, the HTTP server and the cleaner task.

use crate::config::{validate_config, AppConfig};
use crate::http::{HttpServer, HttpServerConfig, HttpState};
use crate::metrics::MetricsCollector;
use crate::service::matchmaking::MatchmakingService;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Matchmaking core
    service: Arc<MatchmakingService>,

    /// HTTP server for the API, health and metrics
    http_server: Arc<HttpServer>,

    /// HTTP server task
    http_task: Option<JoinHandle<()>>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing parlor-duel matchmaking service");

        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        info!(
            "Configuration: service={}, storage={}, skill_range={}, match_window={}s",
            config.service.name,
            config.matchmaking.storage_backend,
            config.matchmaking.skill_range,
            config.matchmaking.match_window_seconds
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let service = Arc::new(MatchmakingService::from_settings(
            config.matchmaking.clone(),
            metrics,
        ));

        let is_running = Arc::new(RwLock::new(false));
        let http_state = HttpState::new(service.clone(), config.service.name.clone())
            .with_running_flag(is_running.clone());
        let http_server = Arc::new(HttpServer::new(
            HttpServerConfig {
                host: config.service.http_host.clone(),
                port: config.service.http_port,
            },
            http_state,
        ));

        Ok(Self {
            config,
            service,
            http_server,
            http_task: None,
            background_tasks: Vec::new(),
            is_running,
        })
    }

    /// Start the HTTP server and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting parlor-duel matchmaking service");

        *self.is_running.write().await = true;

        self.start_http_server().await?;
        self.start_background_tasks();

        info!("✅ Parlor-duel matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of parlor-duel service");

        *self.is_running.write().await = false;

        // Open event streams would otherwise hold the HTTP server open
        let closed = self.service.close_all_sessions();
        info!("Closed {} notification sessions", closed);

        self.stop_background_tasks();
        self.stop_http_server().await;

        let final_stats =
            self.service
                .stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Parlor-duel service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the matchmaking service
    pub fn service(&self) -> Arc<MatchmakingService> {
        self.service.clone()
    }

    async fn start_http_server(&mut self) -> Result<(), ServiceError> {
        let server = self.http_server.clone();
        let port = self.config.service.http_port;

        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("HTTP server failed: {:#}", e);
            } else {
                info!("HTTP server task completed");
            }
        });

        // Give the server a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        if handle.is_finished() {
            return Err(ServiceError::Initialization {
                message: format!("HTTP server exited during startup (port {})", port),
            });
        }

        self.http_task = Some(handle);
        info!("✅ HTTP server started on port {}", port);
        Ok(())
    }

    async fn stop_http_server(&mut self) {
        self.http_server.stop();

        let Some(mut handle) = self.http_task.take() else {
            return;
        };
        let timeout = self.config.shutdown_timeout();
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            warn!("HTTP server did not stop within {:?}; aborting", timeout);
            handle.abort();
        }
    }

    fn start_background_tasks(&mut self) {
        let every = self.config.cleanup_interval();
        let handle = self.service.cleaner().start(every);
        self.background_tasks.push(handle);
    }

    fn stop_background_tasks(&mut self) {
        info!("Stopping {} background tasks...", self.background_tasks.len());
        for handle in self.background_tasks.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.http_host = "127.0.0.1".to_string();
        config.service.http_port = 38_917;
        config.service.shutdown_timeout_seconds = 1;
        config
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = test_config();
        config.matchmaking.skill_range = -1;

        assert!(matches!(
            AppState::new(config).await,
            Err(ServiceError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut app = AppState::new(test_config()).await.unwrap();
        assert!(!app.is_running().await);

        app.start().await.unwrap();
        assert!(app.is_running().await);

        app.shutdown().await.unwrap();
        assert!(!app.is_running().await);
    }
}
