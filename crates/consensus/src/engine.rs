//! The consensus engine interface the node depends on.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ledger_state_machine::ApplyResult;
use serde::{Deserialize, Serialize};

use crate::NodeId;
use crate::error::Result;

/// Role of the local node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftRole {
    /// Accepts writes.
    Leader,
    /// Replicates from a leader.
    Follower,
    /// Campaigning.
    Candidate,
    /// Non-voting replica.
    Learner,
    /// Stopped.
    Shutdown,
}

impl RaftRole {
    /// Name reported in stats and probed by the router.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leader => "Leader",
            Self::Follower => "Follower",
            Self::Candidate => "Candidate",
            Self::Learner => "Learner",
            Self::Shutdown => "Shutdown",
        }
    }
}

impl fmt::Display for RaftRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a member votes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suffrage {
    /// Counts toward quorum.
    Voter,
    /// Receives the log without voting.
    Learner,
}

/// One member of the cluster configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Node id.
    pub id: NodeId,
    /// Replication address.
    pub address: String,
    /// Voting status.
    pub suffrage: Suffrage,
}

/// The committed cluster configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfiguration {
    /// Log index the configuration was committed at, 0 if none yet.
    pub index: u64,
    /// Members, sorted by id.
    pub servers: Vec<Server>,
}

impl ClusterConfiguration {
    /// Looks up a member.
    #[must_use]
    pub fn server(&self, id: &str) -> Option<&Server> {
        self.servers.iter().find(|server| server.id == id)
    }
}

/// A replicated log that orders commands and membership changes.
///
/// A zero `timeout` means no deadline. A zero `prev_index` disables
/// configuration fencing.
#[async_trait]
pub trait ConsensusEngine: Clone + Send + Sync + 'static {
    /// Commits `command` and returns what the state machine produced for it.
    async fn apply(&self, command: Bytes, timeout: Duration) -> Result<ApplyResult>;

    /// Reads the current cluster configuration.
    async fn configuration(&self) -> Result<ClusterConfiguration>;

    /// Adds `id` at `address` as a voting member.
    async fn add_voter(
        &self,
        id: NodeId,
        address: String,
        prev_index: u64,
        timeout: Duration,
    ) -> Result<()>;

    /// Removes `id` from the cluster.
    async fn remove_server(&self, id: NodeId, prev_index: u64, timeout: Duration) -> Result<()>;

    /// Current role of this node.
    fn state(&self) -> RaftRole;

    /// Flat statistics map; always contains `state`.
    fn stats(&self) -> BTreeMap<String, String>;
}
