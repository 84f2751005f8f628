//! # CLI Interface
//!
//! Defines the command-line argument structure for `vela-node` using
//! `clap` derive. Supports two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// VELA wallet ledger service.
///
/// Owns wallet balances, admits and settles transactions exactly once,
/// and gates money movement behind KYC and role policy. Serves the REST
/// API the platform's collaborators call.
#[derive(Parser, Debug)]
#[command(
    name = "vela-node",
    about = "VELA wallet ledger service",
    version,
    propagate_version = true
)]
pub struct VelaNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `vela-node` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ledger service.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the data directory where the ledger state is persisted.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "VELA_DATA_DIR", default_value = "./vela-data")]
    pub data_dir: PathBuf,

    /// Port for the REST API (including `/metrics`).
    #[arg(long, env = "VELA_API_PORT", default_value_t = vela_ledger::config::DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "VELA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Run with an in-memory, throwaway store. State is lost on exit.
    /// Useful for demos and integration testing, never for production.
    #[arg(long)]
    pub ephemeral: bool,
}
