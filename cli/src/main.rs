//! FlowIndex CLI: run the Bitcoin funds-flow indexer.
//!
//! # Commands
//! ```text
//! flowindex run    --rpc-url <url> --database <path> [--wait-for-sync]
//! flowindex status --rpc-url <url> --database <path> [--json]
//! ```
//!
//! Every flag can also come from the environment or a `.env` file.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use flowindex_bitcoin::{BitcoinNode, HttpClientConfig, HttpRpcClient, RetryConfig};
use flowindex_core::ConfirmationPolicy;

mod cmd_run;
mod cmd_status;
mod logging;
mod signal;

#[derive(Parser)]
#[command(
    name = "flowindex",
    about = "Bitcoin funds-flow indexer",
    long_about = "
FlowIndex follows a Bitcoin Core node, waits for blocks to be buried under the
confirmation depth, and stores each block's money-flow graph in SQLite.

ENVIRONMENT VARIABLES:
  BITCOIN_NODE_RPC_URL       Bitcoin Core RPC endpoint
  BITCOIN_NODE_RPC_USER      rpcuser
  BITCOIN_NODE_RPC_PASSWORD  rpcpassword
  FLOWINDEX_DATABASE         SQLite database path
  FLOWINDEX_LOG              Log level (trace|debug|info|warn|error)
",
    version
)]
struct Cli {
    /// Global log level
    #[arg(long, global = true, env = "FLOWINDEX_LOG", default_value = "info")]
    log_level: String,

    /// Per-component override, e.g. `flowindex_core=debug` (repeatable)
    #[arg(long = "log", global = true, value_name = "COMPONENT=LEVEL")]
    log_overrides: Vec<String>,

    /// Emit JSON structured logs
    #[arg(long, global = true, env = "FLOWINDEX_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index confirmed blocks until SIGINT / SIGTERM
    Run(cmd_run::RunArgs),

    /// Show node tip, safe tip and committed height
    Status(cmd_status::StatusArgs),
}

/// Connection settings for the Bitcoin Core node.
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Bitcoin Core JSON-RPC endpoint
    #[arg(long, env = "BITCOIN_NODE_RPC_URL", default_value = "http://127.0.0.1:8332")]
    pub rpc_url: String,

    #[arg(long, env = "BITCOIN_NODE_RPC_USER")]
    pub rpc_user: Option<String>,

    #[arg(long, env = "BITCOIN_NODE_RPC_PASSWORD", hide_env_values = true)]
    pub rpc_password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "BITCOIN_NODE_RPC_TIMEOUT_SECS", default_value_t = 30)]
    pub rpc_timeout_secs: u64,

    /// Retries for transient RPC errors before the attempt fails
    #[arg(long, env = "BITCOIN_NODE_RPC_RETRIES", default_value_t = 3)]
    pub rpc_retries: u32,

    /// Fetch blocks with verbosity 3 (Bitcoin Core 25+) so spends carry
    /// their source address and value
    #[arg(long, env = "FLOWINDEX_PREVOUTS")]
    pub prevouts: bool,
}

impl NodeArgs {
    pub fn connect(&self) -> Result<BitcoinNode<HttpRpcClient>> {
        let auth = match (&self.rpc_user, &self.rpc_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            (None, None) => None,
            _ => bail!("--rpc-user and --rpc-password must be given together"),
        };
        let client = HttpRpcClient::new(
            self.rpc_url.clone(),
            HttpClientConfig {
                retry: RetryConfig {
                    max_retries: self.rpc_retries,
                    ..RetryConfig::default()
                },
                request_timeout: Duration::from_secs(self.rpc_timeout_secs),
                auth,
            },
        )?;

        let node = BitcoinNode::new(client);
        Ok(if self.prevouts { node.with_prevouts() } else { node })
    }
}

/// Where the graph lives, where indexing starts and how deep blocks must be buried.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// SQLite database path or `sqlite:` URL
    #[arg(long, env = "FLOWINDEX_DATABASE", default_value = "./flowindex.db")]
    pub database: String,

    /// Blocks behind the tip before a block is indexed
    #[arg(long, env = "FLOWINDEX_CONFIRMATION_DEPTH", default_value_t = ConfirmationPolicy::DEFAULT_DEPTH)]
    pub confirmation_depth: u64,

    /// First height indexed into an empty database
    #[arg(long, env = "FLOWINDEX_START_HEIGHT", default_value_t = 0)]
    pub start_height: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; a malformed one is not silently ignored.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    let cli = Cli::parse();
    let log = logging::LogConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
        ..Default::default()
    }
    .with_overrides(&cli.log_overrides)?;
    logging::init_tracing(&log)?;

    match cli.command {
        Commands::Run(args) => cmd_run::run(args).await,
        Commands::Status(args) => cmd_status::run(args).await,
    }
}
