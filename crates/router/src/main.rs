//! Ledger cluster router binary.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use ledger_router::{Follower, RouterConfig, run_router};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Node base URLs, probed in order
    #[arg(
        long = "backend",
        value_delimiter = ',',
        default_values = [
            "http://localhost:2221",
            "http://localhost:2222",
            "http://localhost:2223",
        ],
        env = "LEDGER_ROUTER_BACKENDS"
    )]
    backends: Vec<String>,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "LEDGER_ROUTER_LISTEN_ADDR")]
    listen_addr: SocketAddr,

    /// Stats probe timeout, in milliseconds
    #[arg(long, default_value_t = 1000, env = "LEDGER_ROUTER_PROBE_TIMEOUT_MS")]
    probe_timeout_ms: u64,

    /// Node that receives join requests on start
    #[arg(long, default_value = "http://localhost:2221", env = "LEDGER_ROUTER_LEADER")]
    leader: String,

    /// Followers to join, as name=raft_address
    #[arg(
        long = "follower",
        value_delimiter = ',',
        default_values = ["node2=localhost:1112", "node3=localhost:1113"],
        env = "LEDGER_ROUTER_FOLLOWERS"
    )]
    followers: Vec<Follower>,

    /// Skip joining followers on start
    #[arg(long, env = "LEDGER_ROUTER_SKIP_SETUP")]
    skip_setup: bool,

    /// Pause before each join, in milliseconds
    #[arg(long, default_value_t = 2000, env = "LEDGER_ROUTER_JOIN_DELAY_MS")]
    join_delay_ms: u64,

    /// Join request timeout, in milliseconds
    #[arg(long, default_value_t = 15000, env = "LEDGER_ROUTER_JOIN_TIMEOUT_MS")]
    join_timeout_ms: u64,

    /// Enable debug logging
    #[arg(long, env = "LEDGER_ROUTER_DEBUG")]
    debug: bool,
}

impl From<Args> for RouterConfig {
    fn from(args: Args) -> Self {
        Self {
            backends: args.backends,
            listen_addr: args.listen_addr,
            probe_timeout: Duration::from_millis(args.probe_timeout_ms),
            leader: args.leader,
            followers: if args.skip_setup {
                Vec::new()
            } else {
                args.followers
            },
            join_delay: Duration::from_millis(args.join_delay_ms),
            join_timeout: Duration::from_millis(args.join_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ledger_router::Error> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let shutdown_token = CancellationToken::new();

    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    run_router(RouterConfig::from(args), shutdown_token).await
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
