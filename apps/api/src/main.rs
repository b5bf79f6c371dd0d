//! # Keyfront API
//!
//! HTTP server for the Keyfront storefront engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Keyfront API Server                               │
//! │                                                                         │
//! │  Storefront ───► HTTP (8080) ───► axum handlers ───► keyfront-checkout  │
//! │                                        │                    │           │
//! │                                        │                    ▼           │
//! │                                        │              keyfront-db       │
//! │                                        │                    │           │
//! │                                        ▼                    ▼           │
//! │                                  ClaimReaper ────────► SQLite (WAL)     │
//! │                                  (background)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use keyfront_checkout::ClaimReaper;
use keyfront_db::{Database, DbConfig};

use keyfront_api::config::ApiConfig;
use keyfront_api::routes;
use keyfront_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Keyfront API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    info!(
        port = config.port,
        database = %config.database_path,
        "Configuration loaded"
    );

    // Connect to database (runs migrations)
    let db = Arc::new(Database::new(DbConfig::new(&config.database_path)).await?);
    info!("Database ready");

    let checkout_config = Arc::new(config.checkout.clone());

    // Start the claim reaper
    let (reaper, reaper_handle) = ClaimReaper::new(db.clone(), checkout_config.clone());
    let reaper_task = tokio::spawn(reaper.run());
    info!("Claim reaper started");

    // Build the application
    let state = AppState::new(db.clone(), checkout_config);
    let app = routes::router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background work before closing the pool.
    if let Err(e) = reaper_handle.shutdown().await {
        error!(error = %e, "Failed to signal reaper shutdown");
    }
    if let Err(e) = reaper_task.await {
        error!(error = %e, "Reaper task panicked");
    }
    db.close().await;

    info!("Keyfront API stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
