//! Ballot daemon — entry point for running a ballot node.

use std::path::PathBuf;

use anyhow::Context;
use ballot_node::{BallotNode, NodeConfig};
use ballot_utils::LogFormat;
use clap::Parser;

#[derive(Parser)]
#[command(name = "ballot-daemon", about = "Ballot vote ledger and live tally node")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "BALLOT_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for ledger storage.
    #[arg(long, env = "BALLOT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable or disable the HTTP API.
    #[arg(long, env = "BALLOT_ENABLE_RPC")]
    rpc: Option<bool>,

    /// HTTP API port.
    #[arg(long, env = "BALLOT_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Enable or disable the WebSocket tally feed.
    #[arg(long, env = "BALLOT_ENABLE_WEBSOCKET")]
    websocket: Option<bool>,

    /// WebSocket server port.
    #[arg(long, env = "BALLOT_WS_PORT")]
    websocket_port: Option<u16>,

    /// Bearer token required on admin routes.
    #[arg(long, env = "BALLOT_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Enable or disable the Prometheus metrics endpoint.
    #[arg(long, env = "BALLOT_ENABLE_METRICS")]
    metrics: Option<bool>,

    /// Allow cross-origin requests to the HTTP API.
    #[arg(long, env = "BALLOT_ENABLE_CORS")]
    cors: Option<bool>,

    /// Log format: "human" or "json".
    #[arg(long, env = "BALLOT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "BALLOT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node.
    Run,
    /// Run the database integrity check and exit.
    CheckDb,
    /// Print the effective configuration as TOML.
    PrintConfig,
}

impl Cli {
    /// Overlay the flags that were given onto `base`.
    fn apply(&self, mut base: NodeConfig) -> NodeConfig {
        if let Some(v) = &self.data_dir {
            base.data_dir = v.clone();
        }
        if let Some(v) = self.rpc {
            base.enable_rpc = v;
        }
        if let Some(v) = self.rpc_port {
            base.rpc_port = v;
        }
        if let Some(v) = self.websocket {
            base.enable_websocket = v;
        }
        if let Some(v) = self.websocket_port {
            base.websocket_port = v;
        }
        if let Some(v) = &self.admin_token {
            base.admin_token = Some(v.clone());
        }
        if let Some(v) = self.metrics {
            base.enable_metrics = v;
        }
        if let Some(v) = self.cors {
            base.enable_cors = v;
        }
        if let Some(v) = self.log_format {
            base.log_format = v;
        }
        if let Some(v) = &self.log_level {
            base.log_level = v.clone();
        }
        base
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => NodeConfig::default(),
    };
    let config = cli.apply(file_config);

    ballot_utils::init_logging(config.log_format, &config.log_level)
        .context("failed to initialise logging")?;

    let Command::Node { action } = cli.command;
    match action {
        NodeAction::Run => {
            let port_or_off = |enabled: bool, port: u16| {
                if enabled {
                    port.to_string()
                } else {
                    "off".to_string()
                }
            };
            tracing::info!(
                data_dir = %config.data_dir.display(),
                rpc = %port_or_off(config.enable_rpc, config.rpc_port),
                ws = %port_or_off(config.enable_websocket, config.websocket_port),
                "starting ballot node"
            );

            let mut node = BallotNode::new(config)?;
            node.start().await?;

            tracing::info!("shutdown signal received, stopping node");
            node.stop().await?;

            tracing::info!("ballot daemon exited cleanly");
        }
        NodeAction::CheckDb => {
            ballot_store_lmdb::check_data_dir(&config.data_dir).map_err(anyhow::Error::msg)?;
            let env = ballot_store_lmdb::LmdbEnvironment::open(
                &config.data_dir,
                config.max_dbs,
                config.lmdb_map_size,
            )?;
            let report = ballot_store_lmdb::check_integrity(&env)?;
            println!(
                "databases: {}  entries: {}  categories: {}",
                report.databases_checked, report.total_entries, report.categories_checked
            );
            for error in &report.errors {
                println!("error: {error}");
            }
            if !report.is_healthy() {
                anyhow::bail!("{} integrity problem(s) found", report.errors.len());
            }
            println!("ok");
        }
        NodeAction::PrintConfig => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
