//! Cluster membership and statistics handlers.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use ledger_consensus::{ConsensusEngine, MembershipResponse};
use ledger_store::Store;
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct JoinRequest {
    node_id: String,
    raft_address: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RemoveRequest {
    node_id: String,
}

pub(crate) async fn stats<E, S>(State(state): State<AppState<E, S>>) -> Json<BTreeMap<String, String>>
where
    E: ConsensusEngine,
    S: Store,
{
    Json(state.engine.stats())
}

pub(crate) async fn join<E, S>(
    State(state): State<AppState<E, S>>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<MembershipResponse>, ApiError>
where
    E: ConsensusEngine,
    S: Store,
{
    let Json(request) = payload?;

    state
        .membership
        .join(request.node_id, request.raft_address)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e.to_string()))
}

pub(crate) async fn remove<E, S>(
    State(state): State<AppState<E, S>>,
    payload: Result<Json<RemoveRequest>, JsonRejection>,
) -> Result<Json<MembershipResponse>, ApiError>
where
    E: ConsensusEngine,
    S: Store,
{
    let Json(request) = payload?;

    state
        .membership
        .remove(request.node_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e.to_string()))
}
