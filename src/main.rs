//! Bookshare Backend Service
//!
//! Main entry point for the Bookshare society book-rental backend.
//! This service provides:
//! - REST API for accounts, societies, books, rentals, credits and messaging
//! - WebSocket server for society chat and live notifications
//! - Background task purging expired sessions

use bookshare_backend::config::AppConfig;
use bookshare_backend::database::{create_pool, run_migrations};
use bookshare_backend::error::{AppError, AppResult};
use bookshare_backend::{api, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("bookshare_backend={},sqlx=warn,hyper=info", config.log_level).into()
    });
    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Bookshare Backend Service Starting             ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);
    if let Some(ws_port) = config.ws_port {
        info!("WebSocket port: {}", ws_port);
    }
    if config.oauth.is_none() {
        warn!("Google OAuth not configured - sign-in with Google disabled");
    }

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, Some(config.database.migrations_path.as_str()))
        .await
        .map_err(|e| {
            error!("Database migration failed: {}", e);
            AppError::Database(e)
        })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    let http_port = config.http_port;
    let ws_port = config.ws_port;
    let environment = config.environment.clone();

    let app_state = Arc::new(AppState::new(pool, config));
    info!("✓ Application state initialized with repositories and services");

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let purge_state = app_state.clone();
    let purge_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_state.auth_service.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(n) => info!("Purged {} expired session(s)", n),
                Err(e) => warn!("Session purge failed: {}", e),
            }
        }
    });
    info!("✓ Session purge task started (hourly)");

    // =========================================================================
    // START SERVERS
    // =========================================================================
    let http_addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(http_addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    let http_state = app_state.clone();
    let http_handle = tokio::spawn(async move {
        api::serve(listener, http_state).await;
    });
    info!("✓ HTTP server started on {}", http_addr);

    let ws_handle = if let Some(ws_port) = ws_port {
        let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));
        let listener = TcpListener::bind(ws_addr).await.map_err(|e| {
            AppError::Message(format!("Failed to bind WebSocket server: {}", e))
        })?;

        let ws_state = app_state.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from {}", addr);
                        let state = ws_state.clone();
                        tokio::spawn(async move {
                            let ws = state.ws_server.clone();
                            if let Err(e) = ws.handle_connection(stream, state).await {
                                error!("WebSocket connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("WebSocket accept error: {}", e);
                    }
                }
            }
        });

        info!("✓ WebSocket server started on {}", ws_addr);
        Some(handle)
    } else {
        warn!("WS_PORT not configured - WebSocket server not started");
        None
    };

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Bookshare Backend Service Ready!               ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  REST API:     0.0.0.0:{}                              ║", http_port);
    if let Some(ws_port) = ws_port {
        info!("║  WebSocket:    0.0.0.0:{}                              ║", ws_port);
    }
    info!("║  Environment:  {}                                 ║", environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = http_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = purge_handle => {
            error!("Session purge task exited unexpectedly");
        }
        _ = async {
            if let Some(handle) = ws_handle {
                handle.await.ok();
            } else {
                // Never completes if WebSocket is not running
                futures::future::pending::<()>().await;
            }
        } => {
            error!("WebSocket server exited unexpectedly");
        }
    }

    app_state.database.pool().close().await;
    info!("Bookshare backend service shutdown complete");
    Ok(())
}
