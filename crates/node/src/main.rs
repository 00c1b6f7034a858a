//! Payment ledger node binary.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ledger_consensus::ConsensusConfig;
use ledger_node::{NodeConfig, run_node};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Raft node id
    #[arg(long, default_value = "node1", env = "LEDGER_NODE_ID")]
    node_id: String,

    /// Client listener address
    #[arg(long, default_value = "127.0.0.1:2221", env = "LEDGER_HTTP_ADDR")]
    http_addr: SocketAddr,

    /// Cluster listener address
    #[arg(long, default_value = "127.0.0.1:1111", env = "LEDGER_RAFT_ADDR")]
    raft_addr: SocketAddr,

    /// Client address reported in responses
    #[arg(long, env = "LEDGER_ADVERTISE_ADDR")]
    advertise_addr: Option<String>,

    /// Raft address registered in the cluster
    #[arg(long, env = "LEDGER_ADVERTISE_RAFT_ADDR")]
    advertise_raft_addr: Option<String>,

    /// Initialise a single node cluster on start
    #[arg(long, env = "LEDGER_BOOTSTRAP")]
    bootstrap: bool,

    /// Data directory; state is kept in memory when unset
    #[arg(long, env = "LEDGER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Captured command stream to restore before serving
    #[arg(long, env = "LEDGER_RESTORE_FROM")]
    restore_from: Option<PathBuf>,

    /// Commit timeout for mutating requests, in milliseconds
    #[arg(long, default_value_t = 3000, env = "LEDGER_APPLY_TIMEOUT_MS")]
    apply_timeout_ms: u64,

    /// Deadline for a join or removal, in milliseconds
    #[arg(long, default_value_t = 10000, env = "LEDGER_JOIN_TIMEOUT_MS")]
    join_timeout_ms: u64,

    /// Raft heartbeat interval, in milliseconds
    #[arg(long, default_value_t = 500, env = "LEDGER_HEARTBEAT_MS")]
    heartbeat_ms: u64,

    /// Enable debug logging
    #[arg(long, env = "LEDGER_DEBUG")]
    debug: bool,
}

impl From<Args> for NodeConfig {
    fn from(args: Args) -> Self {
        Self {
            node_id: args.node_id,
            http_addr: args.http_addr,
            raft_addr: args.raft_addr,
            advertise_addr: args.advertise_addr,
            advertise_raft_addr: args.advertise_raft_addr,
            bootstrap: args.bootstrap,
            data_dir: args.data_dir,
            restore_from: args.restore_from,
            apply_timeout: Duration::from_millis(args.apply_timeout_ms),
            join_timeout: Duration::from_millis(args.join_timeout_ms),
            consensus: ConsensusConfig {
                heartbeat_interval: args.heartbeat_ms,
                ..ConsensusConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ledger_node::Error> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = NodeConfig::from(args);

    // Create shared shutdown token
    let shutdown_token = CancellationToken::new();

    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    run_node(config, shutdown_token).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }
        _ => {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt signal");
}
