//! Server side of the HTTP raft transport.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use openraft::Raft;
use openraft::error::{InstallSnapshotError, RaftError};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};

use crate::TypeConfig;
use crate::network::RAFT_RPC_PREFIX;

/// Routes serving raft RPCs for `raft`, nested under `/raft-rpc`.
pub fn raft_rpc_router(raft: Raft<TypeConfig>) -> Router {
    let routes = Router::new()
        .route("/append", post(append))
        .route("/vote", post(vote))
        .route("/snapshot", post(snapshot))
        .with_state(raft);

    Router::new().nest(RAFT_RPC_PREFIX, routes)
}

async fn append(
    State(raft): State<Raft<TypeConfig>>,
    Json(request): Json<AppendEntriesRequest<TypeConfig>>,
) -> Json<Result<AppendEntriesResponse<TypeConfig>, RaftError<TypeConfig>>> {
    Json(raft.append_entries(request).await)
}

async fn vote(
    State(raft): State<Raft<TypeConfig>>,
    Json(request): Json<VoteRequest<TypeConfig>>,
) -> Json<Result<VoteResponse<TypeConfig>, RaftError<TypeConfig>>> {
    Json(raft.vote(request).await)
}

async fn snapshot(
    State(raft): State<Raft<TypeConfig>>,
    Json(request): Json<InstallSnapshotRequest<TypeConfig>>,
) -> Json<Result<InstallSnapshotResponse<TypeConfig>, RaftError<TypeConfig, InstallSnapshotError>>>
{
    Json(raft.install_snapshot(request).await)
}
