//! Configuration for the raft engine.

use std::time::Duration;

use openraft::{Config, SnapshotPolicy};

use crate::error::{Error, Result};

/// Timing and naming knobs for [`RaftEngine`](crate::RaftEngine).
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Cluster name.
    pub cluster_name: String,

    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,

    /// Election timeout lower bound in milliseconds.
    pub election_timeout_min: u64,

    /// Election timeout upper bound in milliseconds.
    pub election_timeout_max: u64,

    /// Upper bound for a single raft RPC, including connecting to the peer.
    pub rpc_timeout: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            cluster_name: "ledger".to_string(),
            heartbeat_interval: 500,
            election_timeout_min: 1500,
            election_timeout_max: 3000,
            rpc_timeout: Duration::from_secs(10),
        }
    }
}

impl ConsensusConfig {
    /// Builds the validated openraft config.
    ///
    /// Snapshots carry no state, so log compaction is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if openraft rejects the values.
    pub fn to_raft_config(&self) -> Result<Config> {
        Config {
            cluster_name: self.cluster_name.clone(),
            heartbeat_interval: self.heartbeat_interval,
            election_timeout_min: self.election_timeout_min,
            election_timeout_max: self.election_timeout_max,
            snapshot_policy: SnapshotPolicy::Never,
            ..Default::default()
        }
        .validate()
        .map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConsensusConfig::default().to_raft_config().unwrap();
        assert_eq!(config.heartbeat_interval, 500);
        assert!(matches!(config.snapshot_policy, SnapshotPolicy::Never));
    }

    #[test]
    fn test_inverted_election_timeouts_are_rejected() {
        let config = ConsensusConfig {
            election_timeout_min: 3000,
            election_timeout_max: 1500,
            ..Default::default()
        };
        assert!(matches!(config.to_raft_config(), Err(Error::Config(_))));
    }
}
