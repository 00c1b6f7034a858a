use std::time::Duration;

use thiserror::Error;

use crate::NodeId;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration index moved since the caller read it.
    #[error("configuration changed since index {expected}, now at {actual}")]
    ConfigurationChanged {
        /// Index the caller fenced on.
        expected: u64,
        /// Current configuration index.
        actual: u64,
    },

    /// The raft configuration is invalid.
    #[error("invalid raft config: {0}")]
    Config(String),

    /// The command could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// A join or remove request was refused or failed.
    #[error("{0}")]
    Membership(String),

    /// This node cannot accept writes.
    #[error("node is not the leader (leader: {})", leader.as_deref().unwrap_or("unknown"))]
    NotLeader {
        /// Leader if known.
        leader: Option<NodeId>,
    },

    /// The raft engine reported an error.
    #[error("raft error: {0}")]
    Raft(String),

    /// Raft storage could not be opened.
    #[error("storage error: {0}")]
    Storage(String),

    /// The operation did not finish before its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
