//! # CLI Interface
//!
//! Command-line arguments for `txnwrap-gateway`, parsed with `clap` derive.
//! Every `run` flag can also come from a `TXNWRAP_*` environment variable,
//! which is how secrets are expected to arrive in deployment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use txnwrap::config::WrapperConfig;

use crate::logging::LogFormat;

/// Transaction token and encrypted bank validation gateway.
#[derive(Parser, Debug)]
#[command(
    name = "txnwrap-gateway",
    about = "Transaction token and encrypted bank validation gateway",
    version,
    propagate_version = true
)]
pub struct GatewayCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser)]
pub struct RunArgs {
    /// AES key for transaction tokens (16, 24 or 32 bytes).
    #[arg(long, env = "TXNWRAP_TRANSACTION_AES_KEY", hide_env_values = true)]
    pub transaction_aes_key: String,

    /// IV for transaction tokens (16 bytes).
    #[arg(long, env = "TXNWRAP_TRANSACTION_IV", hide_env_values = true)]
    pub transaction_iv: String,

    /// AES key for payload envelopes. Defaults to the transaction key.
    #[arg(long, env = "TXNWRAP_PAYLOAD_AES_KEY", hide_env_values = true)]
    pub payload_aes_key: Option<String>,

    /// IV for payload envelopes. Defaults to the transaction IV.
    #[arg(long, env = "TXNWRAP_PAYLOAD_IV", hide_env_values = true)]
    pub payload_iv: Option<String>,

    /// Shared password folded into every token.
    #[arg(long, env = "TXNWRAP_TRANSACTION_PASSWORD", hide_env_values = true)]
    pub transaction_password: String,

    /// Bank validation endpoint the gateway forwards to.
    #[arg(long, env = "TXNWRAP_TRUSTHUB_BASE_URL")]
    pub trusthub_base_url: String,

    /// API key sent to the bank validation endpoint as `x-api-key`.
    #[arg(long, env = "TXNWRAP_TRUSTHUB_API_KEY", hide_env_values = true)]
    pub trusthub_api_key: String,

    /// Directory for the token database. Created on first run.
    #[arg(long, short = 'd', env = "TXNWRAP_DATA_DIR", default_value = "./txnwrap-data")]
    pub data_dir: PathBuf,

    /// Keep tokens in memory only; nothing is written to `data_dir`.
    #[arg(long, env = "TXNWRAP_EPHEMERAL")]
    pub ephemeral: bool,

    /// Port for the HTTP API.
    #[arg(long, env = "TXNWRAP_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TXNWRAP_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "TXNWRAP_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl RunArgs {
    /// The core configuration these arguments describe.
    pub fn wrapper_config(&self) -> WrapperConfig {
        WrapperConfig::new(
            self.transaction_aes_key.clone(),
            self.transaction_iv.clone(),
            self.transaction_password.clone(),
        )
        .with_payload_parts(self.payload_aes_key.clone(), self.payload_iv.clone())
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }
}

impl std::fmt::Debug for RunArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunArgs")
            .field("trusthub_base_url", &self.trusthub_base_url)
            .field("data_dir", &self.data_dir)
            .field("ephemeral", &self.ephemeral)
            .field("http_port", &self.http_port)
            .field("metrics_port", &self.metrics_port)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}
