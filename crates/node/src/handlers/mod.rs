mod api;
mod error;
mod raft;

pub use error::ApiError;

use axum::Router;
use axum::routing::{get, post};
use ledger_consensus::ConsensusEngine;
use ledger_store::Store;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The client-facing routes of a node.
pub fn router<E, S>(state: AppState<E, S>) -> Router
where
    E: ConsensusEngine,
    S: Store,
{
    Router::new()
        .route("/raft/stats", get(raft::stats::<E, S>))
        .route("/raft/join", post(raft::join::<E, S>))
        .route("/raft/remove", post(raft::remove::<E, S>))
        .route("/api/pay", post(api::pay::<E, S>))
        .route("/api/recurring", post(api::recurring::<E, S>))
        .route("/api/status/{order_id}", get(api::status::<E, S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
