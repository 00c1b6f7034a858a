//! Consensus layer for the payment ledger.
//!
//! [`ConsensusEngine`] is the narrow interface the rest of the node talks to:
//! submit a command, inspect and change cluster membership, read role and
//! statistics. [`RaftEngine`] implements it on openraft, with an HTTP
//! transport between nodes and a choice of in-memory or RocksDB raft logs.
//! [`MembershipManager`] layers the leader-gated join/remove flow on top.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod engine;
mod error;
mod membership;
mod network;
mod raft_engine;
mod rpc;
mod state_machine;
pub mod storage;
mod types;

pub use config::ConsensusConfig;
pub use engine::{ClusterConfiguration, ConsensusEngine, RaftRole, Server, Suffrage};
pub use error::{Error, Result};
pub use membership::{MembershipManager, MembershipResponse};
pub use network::HttpNetworkFactory;
pub use raft_engine::RaftEngine;
pub use rpc::raft_rpc_router;
pub use state_machine::RaftStateMachineStore;
pub use types::{CommandBytes, NodeId, TypeConfig};
