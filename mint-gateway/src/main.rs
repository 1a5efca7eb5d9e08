// mint-gateway/src/main.rs

//! Mint gateway binary.
//!
//! Serves one mint over HTTP (see the library docs for the routes). It
//! opens the configured ledger store, runs the background task scheduler
//! that propagates records to peer mints, and exposes a Prometheus metrics
//! exporter on `/metrics`.

use std::sync::Arc;

use tokio::{signal, sync::watch};
use tracing_subscriber::EnvFilter;

use ledger::{HttpMintClient, MetricsRegistry, MintContext, Scheduler, run_prometheus_http_server};
use mint_gateway::{app, config::GatewayConfig, state::AppState};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mint_gateway=info,ledger=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = GatewayConfig::load().map_err(|e| format!("failed to load configuration: {e}"))?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.ledger.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.ledger.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage + peer client
    // ---------------------------

    let store = cfg
        .ledger
        .storage
        .open()
        .map_err(|e| format!("failed to open {:?} store: {e}", cfg.ledger.storage.backend))?;

    let client = HttpMintClient::new(&cfg.ledger.client)
        .map_err(|e| format!("failed to create peer client: {e}"))?;

    let mint = MintContext::new(cfg.host.clone(), Arc::new(store), Arc::new(client))
        .with_settlement(cfg.ledger.settlement.clone())
        .with_metrics(metrics.clone());

    // ---------------------------
    // Task scheduler
    // ---------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if cfg.ledger.scheduler.enabled {
        let scheduler = Scheduler::new(mint.clone(), cfg.ledger.scheduler.clone());
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        tracing::warn!("task scheduler disabled; records will not propagate");
        None
    };

    // ---------------------------
    // HTTP server
    // ---------------------------

    let router = app(AppState::new(mint));

    tracing::info!(host = %cfg.host, "mint gateway listening on http://{}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", cfg.listen_addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
