use std::sync::Arc;
use std::time::Duration;

use ledger_consensus::{ConsensusEngine, MembershipManager, RaftRole};
use ledger_state_machine::{Command, LedgerStateMachine};
use ledger_store::Store;
use serde_json::Value;
use tracing::debug;

use crate::handlers::ApiError;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState<E, S: Store> {
    pub(crate) engine: E,
    pub(crate) ledger: LedgerStateMachine<S>,
    pub(crate) membership: MembershipManager<E>,
    pub(crate) addr: Arc<str>,
    pub(crate) apply_timeout: Duration,
}

impl<E: ConsensusEngine, S: Store> AppState<E, S> {
    /// Builds handler state.
    ///
    /// `ledger` must be the state machine `engine` applies to, so that local
    /// reads observe committed writes. `addr` is reported back to clients.
    /// Joins and removals give up after `join_timeout`.
    pub fn new(
        engine: E,
        ledger: LedgerStateMachine<S>,
        addr: impl Into<Arc<str>>,
        apply_timeout: Duration,
        join_timeout: Duration,
    ) -> Self {
        Self {
            membership: MembershipManager::new(engine.clone(), join_timeout),
            engine,
            ledger,
            addr: addr.into(),
            apply_timeout,
        }
    }

    pub(crate) fn ensure_leader(&self) -> Result<(), ApiError> {
        if self.engine.state() == RaftRole::Leader {
            Ok(())
        } else {
            Err(ApiError::new("node is not leader"))
        }
    }

    /// Commits `command` and waits for its result.
    pub(crate) async fn commit(&self, command: Command) -> Result<Option<Value>, ApiError> {
        debug!(operation = %command.operation(), key = command.key(), "committing command");

        let payload = command.encode().map_err(|e| {
            ApiError::new(format!(
                "applyRaft error: error preparing saving data payload: {e}"
            ))
        })?;

        let result = self
            .engine
            .apply(payload, self.apply_timeout)
            .await
            .map_err(|e| {
                ApiError::new(format!(
                    "applyRaft error: error persisting data in raft cluster: {e}"
                ))
            })?;

        result
            .into_result()
            .map_err(|e| ApiError::new(format!("applyRaft error: {e}")))
    }
}
