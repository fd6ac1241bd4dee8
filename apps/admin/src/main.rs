//! # Outlet Admin Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Admin Server                                     │
//! │                                                                         │
//! │  Browser ───► HTTP (8000) ───► Routes ───► StoreRegistry               │
//! │                                               ├── store1.db             │
//! │                                               └── store2.db             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! OUTLET_JWT_SECRET=... admin                 # default config path
//! OUTLET_JWT_SECRET=... admin ./admin.toml    # explicit config file
//! ```

use std::path::PathBuf;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use outlet_admin::config::AdminConfig;
use outlet_admin::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,outlet=debug,sqlx=warn")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Outlet admin server...");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AdminConfig::load(config_path)?;
    info!(
        addr = %config.server.bind_address(),
        stores = config.stores.len(),
        "Configuration loaded"
    );

    let state = AppState::open(config.clone())
        .await
        .context("opening store databases")?;
    for store in state.registry.stores() {
        info!(store = %store.alias, name = %store.display_name, "Store ready");
    }

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    let registry = state.registry.clone();

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
