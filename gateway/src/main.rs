// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # txnwrap Gateway
//!
//! Entry point for the `txnwrap-gateway` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the token store and serves the
//! HTTP API and the Prometheus endpoint.
//!
//! Subcommands:
//!
//! - `run`     — start the gateway
//! - `version` — print build version information

mod api;
mod bank;
mod cli;
mod downstream;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use txnwrap::envelope::PayloadEnvelope;
use txnwrap::storage::{AuditStore, MemoryTokenStore, TokenDB, TokenStore};
use txnwrap::token::TokenService;

use bank::BankValidationService;
use cli::{Commands, GatewayCli};
use downstream::TrustHubClient;
use metrics::GatewayMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GatewayCli::parse();

    match cli.command {
        Commands::Run(args) => run_gateway(args).await,
        Commands::Version => {
            println!("txnwrap-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Starts the API server and the metrics endpoint and runs until a
/// shutdown signal arrives.
async fn run_gateway(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format());

    tracing::info!(
        http_port = args.http_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        ephemeral = args.ephemeral,
        "starting txnwrap-gateway"
    );

    let config = args.wrapper_config();

    // --- Storage ---
    let (token_store, audit_store): (Arc<dyn TokenStore>, Arc<dyn AuditStore>) = if args.ephemeral {
        let store = Arc::new(MemoryTokenStore::new());
        tracing::warn!("ephemeral mode: tokens and audits are kept in memory only");
        let tokens: Arc<dyn TokenStore> = store.clone();
        let audits: Arc<dyn AuditStore> = store;
        (tokens, audits)
    } else {
        let db_path = args.data_dir.join("db");
        std::fs::create_dir_all(&db_path).with_context(|| {
            format!("failed to create database directory: {}", db_path.display())
        })?;
        let db = Arc::new(
            TokenDB::open(&db_path)
                .with_context(|| format!("failed to open database at {}", db_path.display()))?,
        );
        tracing::info!(path = %db_path.display(), "database opened");
        let tokens: Arc<dyn TokenStore> = db.clone();
        let audits: Arc<dyn AuditStore> = db;
        (tokens, audits)
    };

    // --- Core services ---
    let tokens = Arc::new(
        TokenService::new(&config, token_store).context("invalid transaction key configuration")?,
    );
    let envelope = Arc::new(
        PayloadEnvelope::new(&config).context("invalid payload key configuration")?,
    );

    // --- Metrics ---
    let gateway_metrics = Arc::new(GatewayMetrics::new());

    // --- Downstream ---
    let trusthub = Arc::new(
        TrustHubClient::new(args.trusthub_base_url.clone(), args.trusthub_api_key.clone())
            .context("failed to build downstream HTTP client")?,
    );
    tracing::info!(endpoint = %trusthub.base_url(), "downstream bank validator configured");

    let bank = Arc::new(BankValidationService::new(
        Arc::clone(&tokens),
        trusthub,
        audit_store,
        Arc::clone(&gateway_metrics),
    ));

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        tokens,
        envelope,
        bank,
        metrics: Arc::clone(&gateway_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.http_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", api_addr))?;
    tracing::info!("HTTP API listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&gateway_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("txnwrap-gateway stopped");
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
