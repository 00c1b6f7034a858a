//! Leader-gated cluster join and removal.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::NodeId;
use crate::engine::{ConsensusEngine, RaftRole};
use crate::error::{Error, Result};

/// Outcome of a successful membership change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipResponse {
    /// Human readable summary.
    pub message: String,
    /// Engine statistics after the change.
    pub data: BTreeMap<String, String>,
}

/// Admits and evicts voting members through a [`ConsensusEngine`].
///
/// Changes are only attempted on the leader and are never fenced on a prior
/// configuration index. Each change must finish within `timeout`.
#[derive(Clone, Debug)]
pub struct MembershipManager<E> {
    engine: E,
    timeout: Duration,
}

impl<E: ConsensusEngine> MembershipManager<E> {
    /// Wraps `engine`.
    pub const fn new(engine: E, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Adds `node_id` at `raft_address` as a voter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Membership`] if this node is not the leader, the
    /// configuration cannot be read or the engine rejects the change.
    pub async fn join(&self, node_id: NodeId, raft_address: String) -> Result<MembershipResponse> {
        self.ensure_leader()?;
        self.read_configuration().await?;

        self.engine
            .add_voter(node_id.clone(), raft_address.clone(), 0, self.timeout)
            .await
            .map_err(|e| {
                warn!(%node_id, "join failed: {e}");
                Error::Membership(format!("error add voter: {e}"))
            })?;

        info!(%node_id, %raft_address, "node joined");
        Ok(MembershipResponse {
            message: format!("node {node_id} at {raft_address} joined successfully"),
            data: self.engine.stats(),
        })
    }

    /// Removes `node_id` from the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Membership`] if this node is not the leader, the
    /// configuration cannot be read or the engine rejects the change.
    pub async fn remove(&self, node_id: NodeId) -> Result<MembershipResponse> {
        self.ensure_leader()?;
        self.read_configuration().await?;

        self.engine
            .remove_server(node_id.clone(), 0, self.timeout)
            .await
            .map_err(|e| {
                warn!(%node_id, "remove failed: {e}");
                Error::Membership(format!("error removing existing node {node_id}: {e}"))
            })?;

        info!(%node_id, "node removed");
        Ok(MembershipResponse {
            message: format!("node {node_id} removed successfully"),
            data: self.engine.stats(),
        })
    }

    fn ensure_leader(&self) -> Result<()> {
        if self.engine.state() == RaftRole::Leader {
            Ok(())
        } else {
            Err(Error::Membership("not the leader".to_string()))
        }
    }

    async fn read_configuration(&self) -> Result<()> {
        self.engine
            .configuration()
            .await
            .map(|_| ())
            .map_err(|e| Error::Membership(format!("failed to get raft configuration: {e}")))
    }
}
