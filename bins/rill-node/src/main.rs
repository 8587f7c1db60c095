//! Rill full node binary.
//!
//! Opens the sharded block store and wallet state, then serves the
//! read-only JSON-RPC surface. Block application is driven externally by
//! the consensus collaborator calling `Node::apply_block`; this binary
//! does not run a P2P event loop itself.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use rill_node_lib::{start_rpc_server, Node, NodeConfig};
use tracing::{error, info};

/// Rill full node.
#[derive(Parser, Debug)]
#[command(name = "rill-node", version, about = "Rill full node: wallet state, block store, and JSON-RPC")]
struct Args {
    /// Data directory for the block store.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// RPC server bind address.
    #[arg(long, default_value = "127.0.0.1")]
    rpc_bind: String,

    /// RPC server port.
    #[arg(long, default_value_t = rill_core::constants::DEFAULT_RPC_PORT)]
    rpc_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Keep every applied block and transaction; never prune old shards.
    #[arg(long)]
    archival: bool,
}

impl Args {
    fn into_config(self) -> NodeConfig {
        let data_dir = self.data_dir.unwrap_or_else(|| {
            dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("rill")
        });

        NodeConfig {
            data_dir,
            rpc_bind: self.rpc_bind,
            rpc_port: self.rpc_port,
            log_level: self.log_level,
            archival: self.archival,
            ..NodeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = args.into_config();

    init_logging(&config.log_level);

    info!("Rill full node v{}", env!("CARGO_PKG_VERSION"));
    info!(data_dir = ?config.data_dir, "starting");
    info!(rpc_addr = %config.rpc_addr(), "rpc");

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!(error = %e, "failed to create data_dir");
        process::exit(1);
    }

    let node = match Node::open(config.clone()) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            error!(error = %e, "failed to open node");
            process::exit(1);
        }
    };

    match node.store().tip() {
        Ok(Some(tip)) => info!(tip, "chain tip"),
        Ok(None) => info!("chain tip: empty store"),
        Err(e) => error!(error = %e, "failed to read chain tip"),
    }

    let rpc_handle = match start_rpc_server(&config.rpc_addr(), node.clone()).await {
        Ok(handle) => {
            info!(addr = %config.rpc_addr(), "RPC server listening");
            handle
        }
        Err(e) => {
            error!(error = %e, "failed to start RPC server");
            process::exit(1);
        }
    };

    info!("Rill node running (Ctrl+C to stop)");
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    info!("received Ctrl+C, shutting down");

    rpc_handle.stop().ok();
    info!("RPC server stopped");
}

/// Initialize the tracing subscriber with the given log level filter.
fn init_logging(level_str: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}
