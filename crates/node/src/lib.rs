//! A payment ledger node.
//!
//! Each node runs two listeners: the client listener serving `/api/*` and
//! `/raft/*`, and the cluster listener serving raft RPCs to peers. Mutating
//! requests are only accepted on the leader and are committed through the
//! raft log before they are acknowledged. Status reads are served from the
//! node's local copy.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;
mod handlers;
mod node;
mod state;

pub use error::{Error, Result};
pub use handlers::{ApiError, router};
pub use node::{LedgerNode, run_node};
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ledger_consensus::ConsensusConfig;

/// Configuration for a node instance
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Raft node id
    pub node_id: String,

    /// Client listener address
    pub http_addr: SocketAddr,

    /// Cluster (raft RPC) listener address
    pub raft_addr: SocketAddr,

    /// Client address reported in responses; defaults to the bound client address
    pub advertise_addr: Option<String>,

    /// Raft address registered in the cluster; defaults to the bound cluster address
    pub advertise_raft_addr: Option<String>,

    /// Initialise a single-voter cluster on start
    pub bootstrap: bool,

    /// Directory for the RocksDB store and raft log; in-memory when unset
    pub data_dir: Option<PathBuf>,

    /// Captured command stream to restore into the local store before serving
    pub restore_from: Option<PathBuf>,

    /// How long a mutating request waits for its command to commit
    pub apply_timeout: Duration,

    /// How long a join or removal may take before it is abandoned
    pub join_timeout: Duration,

    /// Raft timings
    pub consensus: ConsensusConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node1".to_string(),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 2221)),
            raft_addr: SocketAddr::from(([127, 0, 0, 1], 1111)),
            advertise_addr: None,
            advertise_raft_addr: None,
            bootstrap: false,
            data_dir: None,
            restore_from: None,
            apply_timeout: Duration::from_secs(3),
            join_timeout: Duration::from_secs(10),
            consensus: ConsensusConfig::default(),
        }
    }
}
