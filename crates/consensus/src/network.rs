//! HTTP transport between raft nodes.
//!
//! Each RPC is a JSON `POST` to `http://{address}/raft-rpc/{append,vote,snapshot}`
//! on the peer's cluster listener. The body of a successful response is the
//! serialised `Result<Response, RaftError>` from the remote raft instance.

use std::error::Error as StdError;
use std::time::Duration;

use openraft::BasicNode;
use openraft::error::{
    InstallSnapshotError, NetworkError, RPCError, RaftError, RemoteError, Unreachable,
};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::Error;
use crate::{NodeId, TypeConfig};

/// Path prefix the cluster listener serves raft RPCs under.
pub const RAFT_RPC_PREFIX: &str = "/raft-rpc";

/// Creates [`HttpNetwork`] clients that share one connection pool.
#[derive(Clone, Debug)]
pub struct HttpNetworkFactory {
    client: reqwest::Client,
    rpc_timeout: Duration,
}

impl HttpNetworkFactory {
    /// Creates a factory whose RPCs never outlive `rpc_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(rpc_timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(rpc_timeout)
            .timeout(rpc_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build raft http client: {e}")))?;

        Ok(Self {
            client,
            rpc_timeout,
        })
    }
}

impl RaftNetworkFactory<TypeConfig> for HttpNetworkFactory {
    type Network = HttpNetwork;

    async fn new_client(&mut self, target: NodeId, node: &BasicNode) -> Self::Network {
        HttpNetwork {
            client: self.client.clone(),
            target,
            address: node.addr.clone(),
            rpc_timeout: self.rpc_timeout,
        }
    }
}

/// Connection to a single peer.
pub struct HttpNetwork {
    client: reqwest::Client,
    target: NodeId,
    address: String,
    rpc_timeout: Duration,
}

impl HttpNetwork {
    /// openraft's deadline for one RPC, capped at the configured timeout.
    fn deadline(&self, hard_ttl: Duration) -> Duration {
        hard_ttl.min(self.rpc_timeout)
    }

    async fn send<Req, Resp, E>(
        &self,
        endpoint: &str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp, RPCError<TypeConfig, RaftError<TypeConfig, E>>>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
        E: StdError + DeserializeOwned,
    {
        let url = format!("http://{}{RAFT_RPC_PREFIX}/{endpoint}", self.address);
        trace!(target_node = %self.target, %url, "sending raft rpc");

        let response = self
            .client
            .post(&url)
            .timeout(self.deadline(timeout))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    RPCError::Unreachable(Unreachable::new(&e))
                } else {
                    RPCError::Network(NetworkError::new(&e))
                }
            })?;

        let response = response
            .error_for_status()
            .map_err(|e| RPCError::Network(NetworkError::new(&e)))?;

        let result: Result<Resp, RaftError<TypeConfig, E>> = response
            .json()
            .await
            .map_err(|e| RPCError::Network(NetworkError::new(&e)))?;

        result.map_err(|e| RPCError::RemoteError(RemoteError::new(self.target.clone(), e)))
    }
}

impl RaftNetwork<TypeConfig> for HttpNetwork {
    async fn append_entries(
        &mut self,
        rpc: AppendEntriesRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<AppendEntriesResponse<TypeConfig>, RPCError<TypeConfig, RaftError<TypeConfig>>>
    {
        self.send("append", &rpc, option.hard_ttl()).await
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshotRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<
        InstallSnapshotResponse<TypeConfig>,
        RPCError<TypeConfig, RaftError<TypeConfig, InstallSnapshotError>>,
    > {
        self.send("snapshot", &rpc, option.hard_ttl()).await
    }

    async fn vote(
        &mut self,
        rpc: VoteRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<VoteResponse<TypeConfig>, RPCError<TypeConfig, RaftError<TypeConfig>>> {
        self.send("vote", &rpc, option.hard_ttl()).await
    }
}
