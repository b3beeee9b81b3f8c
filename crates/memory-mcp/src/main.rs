//! Memory MCP Server
//!
//! Thin process wiring around `memory-core`: loads configuration, connects
//! the store, spawns the ingestion worker and TTL/verification daemon as
//! background tasks, then serves the production and admin tool surfaces on
//! two separate axum routers. None of the decision logic lives here — this
//! crate is routing, auth, and startup only.

mod auth;
mod envelope;
mod state;
mod tools;

use axum::middleware;
use memory_core::llm::OpenAiGateway;
use memory_core::{Config, Store};
use state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    if let Err(e) = run(config).await {
        error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = Store::connect(&config).await?;
    let gateway: Arc<dyn memory_core::llm::LlmGateway> = Arc::new(OpenAiGateway::new(&config));
    let config = Arc::new(config);

    let state = AppState {
        store: store.clone(),
        gateway: gateway.clone(),
        config: config.clone(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    {
        let worker_store = store.clone();
        let worker_gateway = OpenAiGateway::new(&config);
        let worker_config = (*config).clone();
        let worker_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            memory_core::worker::run(worker_store, worker_gateway, worker_config, worker_shutdown).await;
        });
    }

    {
        let daemon_store = store.clone();
        let daemon_gateway = OpenAiGateway::new(&config);
        let daemon_config = (*config).clone();
        let daemon_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            memory_core::ttl_daemon::run(daemon_store, daemon_gateway, daemon_config, daemon_shutdown).await;
        });
    }

    let production_app = tools::production_router(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));
    let admin_app = tools::admin_router(state.clone());

    let production_addr = format!("0.0.0.0:{}", config.production_port);
    let admin_addr = format!("0.0.0.0:{}", config.admin_port);

    let production_listener = TcpListener::bind(&production_addr).await?;
    let admin_listener = TcpListener::bind(&admin_addr).await?;

    info!(addr = %production_addr, "production HTTP surface listening");
    info!(addr = %admin_addr, "admin HTTP surface listening");

    let mut production_shutdown = shutdown_rx.clone();
    let mut admin_shutdown = shutdown_rx.clone();

    let production_server = axum::serve(production_listener, production_app).with_graceful_shutdown(async move {
        let _ = production_shutdown.changed().await;
    });
    let admin_server = axum::serve(admin_listener, admin_app).with_graceful_shutdown(async move {
        let _ = admin_shutdown.changed().await;
    });

    tokio::select! {
        result = production_server => { result?; }
        result = admin_server => { result?; }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    let _ = shutdown_tx.send(true);
    info!("memory-mcp shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
