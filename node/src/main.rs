// Copyright (c) 2026 Vela Financial Technologies. MIT License.
// See LICENSE for details.

//! # VELA Ledger Service
//!
//! Entry point for the `vela-node` binary. Parses CLI arguments, initializes
//! logging and metrics, restores the ledger engine from its persisted
//! snapshot, and serves the REST API.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the ledger service
//! - `version` — print build version information
//!
//! ## Durability model
//!
//! The engine is in-memory; durability comes from full-state snapshots
//! written to sled on a fixed cadence and on graceful shutdown. See
//! `vela_ledger::storage` for the tree layout.

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use vela_ledger::config::{LEDGER_VERSION, SNAPSHOT_INTERVAL};
use vela_ledger::engine::LedgerEngine;
use vela_ledger::storage::LedgerStore;

use api::AppState;
use cli::{Commands, VelaNodeCli};
use logging::LogFormat;
use metrics::LedgerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VelaNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_service(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full ledger service: engine restore, API server, and the
/// periodic snapshot task.
async fn run_service(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "vela_node=info,vela_ledger=info,tower_http=warn",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let store = if args.ephemeral {
        tracing::warn!("running with an ephemeral store; state will not survive exit");
        LedgerStore::open_temporary().context("opening temporary store")?
    } else {
        LedgerStore::open(&args.data_dir)
            .with_context(|| format!("opening store at {}", args.data_dir.display()))?
    };

    let snapshot = store.load_snapshot().context("loading persisted state")?;
    let engine = Arc::new(LedgerEngine::from_snapshot(snapshot));
    tracing::info!(
        wallets = engine.registry().wallet_count(),
        transactions = engine.transaction_count(),
        pending = engine.pending_count(),
        last_snapshot = ?store.last_snapshot_at().ok().flatten(),
        "ledger state restored"
    );

    let state = AppState {
        version: LEDGER_VERSION.to_string(),
        engine: Arc::clone(&engine),
        metrics: Arc::new(LedgerMetrics::new()),
        started_at: chrono::Utc::now(),
    };
    state
        .metrics
        .pending_transactions
        .set(engine.pending_count() as i64);

    // Periodic snapshot task. The final snapshot on shutdown happens below,
    // after the server has stopped accepting requests.
    let snapshot_engine = Arc::clone(&engine);
    let snapshot_store = store.clone();
    let snapshot_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if let Err(e) = snapshot_store.persist_snapshot(&snapshot_engine.snapshot()) {
                tracing::error!("periodic snapshot failed: {}", e);
            }
        }
    });

    let router = api::create_router(state);
    let addr = format!("0.0.0.0:{}", args.api_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding API listener on {addr}"))?;
    tracing::info!(%addr, version = LEDGER_VERSION, "vela-node serving");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    snapshot_task.abort();
    store
        .persist_snapshot(&engine.snapshot())
        .context("final snapshot on shutdown")?;
    store.flush().context("final flush on shutdown")?;
    tracing::info!("shutdown complete, state persisted");
    Ok(())
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("shutdown signal received");
}

/// Prints build version information.
fn print_version() {
    println!("vela-node {LEDGER_VERSION}");
    println!("wallet ledger & transaction core");
}
