//! [`ConsensusEngine`] implemented on openraft.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ledger_state_machine::{ApplyResult, LedgerStateMachine};
use ledger_store::Store;
use openraft::error::{ClientWriteError, RaftError};
use openraft::storage::RaftLogStorage;
use openraft::{BasicNode, ChangeMembers, Raft, RaftMetrics, ServerState};
use tracing::{debug, info, warn};

use crate::config::ConsensusConfig;
use crate::engine::{ClusterConfiguration, ConsensusEngine, RaftRole, Server, Suffrage};
use crate::error::{Error, Result};
use crate::network::HttpNetworkFactory;
use crate::rpc::raft_rpc_router;
use crate::state_machine::RaftStateMachineStore;
use crate::types::{CommandBytes, NodeId, TypeConfig};

/// A raft node applying committed commands to a ledger store.
pub struct RaftEngine<S: Store> {
    node_id: NodeId,
    raft: Raft<TypeConfig>,
    state_machine: Arc<RaftStateMachineStore<S>>,
}

impl<S: Store> Clone for RaftEngine<S> {
    fn clone(&self) -> Self {
        Self {
            node_id: self.node_id.clone(),
            raft: self.raft.clone(),
            state_machine: Arc::clone(&self.state_machine),
        }
    }
}

impl<S: Store> RaftEngine<S> {
    /// Starts a raft node with the given log store and ledger.
    ///
    /// The node talks to peers over [`HttpNetworkFactory`]; it only becomes
    /// part of a cluster once [`bootstrap`](Self::bootstrap) is called on it
    /// or a leader adds it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid timings and [`Error::Raft`] if
    /// openraft cannot start on the given storage.
    pub async fn new<L>(
        node_id: NodeId,
        config: &ConsensusConfig,
        log_store: L,
        ledger: LedgerStateMachine<S>,
    ) -> Result<Self>
    where
        L: RaftLogStorage<TypeConfig>,
    {
        let raft_config = Arc::new(config.to_raft_config()?);
        let state_machine = Arc::new(RaftStateMachineStore::new(ledger));

        let raft = Raft::new(
            node_id.clone(),
            raft_config,
            HttpNetworkFactory::new(config.rpc_timeout)?,
            log_store,
            Arc::clone(&state_machine),
        )
        .await
        .map_err(|e| Error::Raft(e.to_string()))?;

        info!(%node_id, "raft node started");

        Ok(Self {
            node_id,
            raft,
            state_machine,
        })
    }

    /// This node's id.
    pub fn id(&self) -> &NodeId {
        &self.node_id
    }

    /// The underlying raft handle.
    pub const fn raft(&self) -> &Raft<TypeConfig> {
        &self.raft
    }

    /// The ledger this node applies committed commands to, for local reads.
    pub fn ledger(&self) -> &LedgerStateMachine<S> {
        self.state_machine.ledger()
    }

    /// Routes serving raft RPCs to this node.
    pub fn rpc_router(&self) -> axum::Router {
        raft_rpc_router(self.raft.clone())
    }

    /// Initialises a single-voter cluster made of this node at `raft_address`.
    ///
    /// An already initialised node is left as it is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Raft`] if initialisation is rejected.
    pub async fn bootstrap(&self, raft_address: impl Into<String>) -> Result<()> {
        if self
            .raft
            .is_initialized()
            .await
            .map_err(|e| Error::Raft(e.to_string()))?
        {
            info!(node_id = %self.node_id, "raft already initialised, skipping bootstrap");
            return Ok(());
        }

        let members = maplit::btreemap! {
            self.node_id.clone() => BasicNode::new(raft_address.into()),
        };
        self.raft
            .initialize(members)
            .await
            .map_err(|e| Error::Raft(e.to_string()))?;

        info!(node_id = %self.node_id, "bootstrapped single node cluster");
        Ok(())
    }

    /// Waits until some node is known as leader and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no leader shows up in time.
    pub async fn wait_for_leader(&self, timeout: Duration) -> Result<NodeId> {
        let metrics = self
            .raft
            .wait(Some(timeout))
            .metrics(|m| m.current_leader.is_some(), "leader elected")
            .await
            .map_err(|_| Error::Timeout(timeout))?;

        metrics.current_leader.ok_or(Error::Timeout(timeout))
    }

    /// Stops the raft node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Raft`] if the raft task failed while stopping.
    pub async fn shutdown(&self) -> Result<()> {
        self.raft
            .shutdown()
            .await
            .map_err(|e| Error::Raft(e.to_string()))?;
        info!(node_id = %self.node_id, "raft node stopped");
        Ok(())
    }

    fn metrics(&self) -> RaftMetrics<TypeConfig> {
        self.raft.metrics().borrow().clone()
    }

    fn current_configuration(&self) -> ClusterConfiguration {
        configuration_from(&self.metrics())
    }

    /// Drops `id` from the membership if a failed join left it a learner.
    async fn discard_learner(&self, id: &NodeId, timeout: Duration) {
        let is_learner = self
            .current_configuration()
            .server(id)
            .is_some_and(|server| server.suffrage == Suffrage::Learner);
        if !is_learner {
            return;
        }

        let ids: BTreeSet<NodeId> = maplit::btreeset! { id.clone() };
        let removed = with_deadline(
            timeout,
            self.raft.change_membership(ChangeMembers::RemoveNodes(ids), false),
        )
        .await
        .and_then(|changed| changed.map_err(write_error));

        match removed {
            Ok(_) => info!(node_id = %id, "discarded learner of failed join"),
            Err(e) => warn!(node_id = %id, "failed to discard learner: {e}"),
        }
    }

    fn fence(&self, prev_index: u64) -> Result<()> {
        if prev_index == 0 {
            return Ok(());
        }

        let actual = self.current_configuration().index;
        if actual == prev_index {
            Ok(())
        } else {
            Err(Error::ConfigurationChanged {
                expected: prev_index,
                actual,
            })
        }
    }
}

#[async_trait]
impl<S: Store> ConsensusEngine for RaftEngine<S> {
    async fn apply(&self, command: Bytes, timeout: Duration) -> Result<ApplyResult> {
        let response = with_deadline(timeout, self.raft.client_write(CommandBytes(command)))
            .await?
            .map_err(write_error)?;

        debug!(index = response.log_id.index, "command committed");
        Ok(response.data)
    }

    async fn configuration(&self) -> Result<ClusterConfiguration> {
        Ok(self.current_configuration())
    }

    async fn add_voter(
        &self,
        id: NodeId,
        address: String,
        prev_index: u64,
        timeout: Duration,
    ) -> Result<()> {
        self.fence(prev_index)?;

        let result = with_deadline(timeout, async {
            self.raft
                .add_learner(id.clone(), BasicNode::new(address), true)
                .await
                .map_err(write_error)?;

            let voters: BTreeSet<NodeId> = maplit::btreeset! { id.clone() };
            self.raft
                .change_membership(ChangeMembers::AddVoterIds(voters), false)
                .await
                .map_err(write_error)?;

            Ok::<(), Error>(())
        })
        .await
        .and_then(|added| added);

        match result {
            Ok(()) => {
                info!(node_id = %id, "added voter");
                Ok(())
            }
            Err(e) => {
                warn!(node_id = %id, "add voter failed: {e}");
                self.discard_learner(&id, timeout).await;
                Err(e)
            }
        }
    }

    async fn remove_server(&self, id: NodeId, prev_index: u64, timeout: Duration) -> Result<()> {
        self.fence(prev_index)?;

        let Some(server) = self.current_configuration().server(&id).cloned() else {
            warn!(node_id = %id, "remove requested for unknown server");
            return Ok(());
        };

        let ids: BTreeSet<NodeId> = maplit::btreeset! { id.clone() };
        let change = match server.suffrage {
            Suffrage::Voter => ChangeMembers::RemoveVoters(ids),
            Suffrage::Learner => ChangeMembers::RemoveNodes(ids),
        };

        with_deadline(timeout, self.raft.change_membership(change, false))
            .await?
            .map_err(write_error)?;

        info!(node_id = %id, "removed server");
        Ok(())
    }

    fn state(&self) -> RaftRole {
        role_from(self.metrics().state)
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let metrics = self.metrics();
        let configuration = configuration_from(&metrics);

        let voters = configuration
            .servers
            .iter()
            .filter(|server| server.suffrage == Suffrage::Voter)
            .count();

        let mut stats = BTreeMap::new();
        stats.insert("id".to_string(), metrics.id.clone());
        stats.insert(
            "state".to_string(),
            role_from(metrics.state).as_str().to_string(),
        );
        stats.insert("term".to_string(), metrics.current_term.to_string());
        stats.insert(
            "last_log_index".to_string(),
            metrics.last_log_index.unwrap_or(0).to_string(),
        );
        stats.insert(
            "applied_index".to_string(),
            metrics
                .last_applied
                .as_ref()
                .map_or(0, |id| id.index)
                .to_string(),
        );
        stats.insert(
            "leader_id".to_string(),
            metrics.current_leader.clone().unwrap_or_default(),
        );
        stats.insert(
            "num_peers".to_string(),
            voters.saturating_sub(1).to_string(),
        );
        stats.insert(
            "latest_configuration_index".to_string(),
            configuration.index.to_string(),
        );
        stats.insert(
            "latest_configuration".to_string(),
            serde_json::to_string(&configuration.servers).unwrap_or_default(),
        );
        stats
    }
}

/// Awaits `future`, bounded by `timeout` unless it is zero.
async fn with_deadline<F: Future>(timeout: Duration, future: F) -> Result<F::Output> {
    if timeout.is_zero() {
        return Ok(future.await);
    }

    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| Error::Timeout(timeout))
}

fn write_error(err: RaftError<TypeConfig, ClientWriteError<TypeConfig>>) -> Error {
    if let Some(forward) = err.forward_to_leader() {
        return Error::NotLeader {
            leader: forward.leader_id.clone(),
        };
    }
    Error::Raft(err.to_string())
}

const fn role_from(state: ServerState) -> RaftRole {
    match state {
        ServerState::Leader => RaftRole::Leader,
        ServerState::Follower => RaftRole::Follower,
        ServerState::Candidate => RaftRole::Candidate,
        ServerState::Learner => RaftRole::Learner,
        ServerState::Shutdown => RaftRole::Shutdown,
    }
}

fn configuration_from(metrics: &RaftMetrics<TypeConfig>) -> ClusterConfiguration {
    let stored = &metrics.membership_config;
    let membership = stored.membership();
    let voters: BTreeSet<NodeId> = membership.voter_ids().collect();

    let servers = membership
        .nodes()
        .map(|(id, node)| Server {
            id: id.clone(),
            address: node.addr.clone(),
            suffrage: if voters.contains(id) {
                Suffrage::Voter
            } else {
                Suffrage::Learner
            },
        })
        .collect();

    ClusterConfiguration {
        index: stored.log_id().as_ref().map_or(0, |id| id.index),
        servers,
    }
}
