//! Main entry point for the Parlor Duel matchmaking service
//!
//! This is the production entry point that initializes and runs the
//! complete matchmaking microservice with proper error handling,
//! logging, and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use parlor_duel::config::{AppConfig, StorageBackend};
use parlor_duel::service::{AppState, HealthCheck, HealthStatus, MatchmakingService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Parlor Duel Matchmaking Service - head-to-head pairing by skill and queue time
#[derive(Parser)]
#[command(
    name = "parlor-duel",
    version,
    about = "A head-to-head matchmaking microservice pairing players by skill and queue time",
    long_about = "Parlor Duel queues players over HTTP, pairs each waiting player with the oldest \
                 compatible opponent inside a skill window, and streams queue position and match \
                 notifications to clients as server-sent events."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Storage backend override
    #[arg(long, value_name = "BACKEND", help = "Override storage backend (memory, sharded)")]
    storage: Option<StorageBackend>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config.clone()).await?;
    let service = app_state.service();

    match HealthCheck::check(&service, true, &config.service.name, Duration::ZERO).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            println!("  Players Searching: {}", health.stats.players_searching);
            println!("  Matches Created: {}", health.stats.matches_created);
            println!("  Active Sessions: {}", health.stats.active_sessions);
            for check in &health.checks {
                println!("  {}: {}", check.name, check.status);
            }

            if health.status == HealthStatus::Healthy {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Run periodic health checks
async fn health_check_task(service: Arc<MatchmakingService>, service_name: String) {
    let started = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    loop {
        interval.tick().await;

        match HealthCheck::check(&service, true, &service_name, started.elapsed()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} searching, {} matches created, {} open sessions",
                    health.status,
                    health.stats.players_searching,
                    health.stats.matches_created,
                    health.stats.active_sessions
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    let mm = &config.matchmaking;
    info!("🚀 Parlor Duel Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   HTTP: {}:{}",
        config.service.http_host, config.service.http_port
    );
    info!("   Storage: {}", mm.storage_backend);
    info!(
        "   Skill window: ±{}, match window: {}s, stale after: {}s",
        mm.skill_range, mm.match_window_seconds, mm.stale_after_seconds
    );
    info!(
        "   Poll: {}ms, heartbeat: {}s, cleanup: {}s",
        mm.poll_interval_ms, mm.heartbeat_interval_seconds, mm.cleanup_interval_seconds
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(storage) = args.storage {
        config.matchmaking.storage_backend = storage;
    }

    parlor_duel::config::validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Some(config_path) = &args.config {
        info!("Loaded configuration from: {}", config_path.display());
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = tokio::spawn(health_check_task(
        app_state.service(),
        config.service.name.clone(),
    ));

    info!("✅ Parlor Duel Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    // Allow one extra second beyond the server's own drain timeout
    let shutdown_timeout = config.shutdown_timeout() + Duration::from_secs(1);
    match tokio::time::timeout(shutdown_timeout, app_state.shutdown()).await {
        Ok(Ok(())) => {
            info!("✅ Graceful shutdown completed successfully");
        }
        Ok(Err(e)) => {
            error!("Shutdown completed with errors: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("🛑 Parlor Duel Matchmaking Service stopped");
    Ok(())
}
