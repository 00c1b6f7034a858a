//! Bridges committed raft entries into the ledger state machine.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use ledger_state_machine::{ApplyResult, LedgerStateMachine};
use ledger_store::Store;
use openraft::storage::{RaftStateMachine, Snapshot};
use openraft::{
    Entry, EntryPayload, LogId, RaftSnapshotBuilder, SnapshotMeta, StorageError, StoredMembership,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::TypeConfig;

/// Applied position and membership as saved in the ledger store.
#[derive(Serialize, Deserialize)]
struct AppliedState {
    last_applied: Option<LogId<TypeConfig>>,
    membership: StoredMembership<TypeConfig>,
}

/// Raft state machine over a [`LedgerStateMachine`].
///
/// The applied position and membership are saved to the ledger store after
/// every entry, so a restarted node resumes after the last applied entry
/// instead of replaying its log over the final state. A crash between a
/// command and its position write replays that one command only.
pub struct RaftStateMachineStore<S: Store> {
    ledger: LedgerStateMachine<S>,
    /// Last applied log id
    applied: RwLock<Option<LogId<TypeConfig>>>,
    /// Current membership
    membership: RwLock<StoredMembership<TypeConfig>>,
    /// Metadata of the last snapshot built or installed
    snapshot: RwLock<Option<SnapshotMeta<TypeConfig>>>,
}

impl<S: Store> RaftStateMachineStore<S> {
    /// Wraps `ledger`.
    pub fn new(ledger: LedgerStateMachine<S>) -> Self {
        Self {
            ledger,
            applied: RwLock::new(None),
            membership: RwLock::new(StoredMembership::default()),
            snapshot: RwLock::new(None),
        }
    }

    /// The wrapped ledger state machine.
    pub const fn ledger(&self) -> &LedgerStateMachine<S> {
        &self.ledger
    }

    /// Index of the last applied entry, 0 before the first.
    pub async fn applied_index(&self) -> u64 {
        self.applied.read().await.as_ref().map_or(0, |id| id.index)
    }

    async fn save_applied_state(&self) -> Result<(), StorageError<TypeConfig>> {
        let state = AppliedState {
            last_applied: self.applied.read().await.clone(),
            membership: self.membership.read().await.clone(),
        };
        let encoded = serde_json::to_vec(&state).map_err(|e| StorageError::write(&e))?;

        self.ledger
            .save_applied_state(Bytes::from(encoded))
            .await
            .map_err(|e| StorageError::write(&e))
    }

    async fn load_applied_state(&self) -> Result<(), StorageError<TypeConfig>> {
        let Some(bytes) = self
            .ledger
            .load_applied_state()
            .await
            .map_err(|e| StorageError::read(&e))?
        else {
            return Ok(());
        };

        let state: AppliedState =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::read(&e))?;
        debug!(
            index = state.last_applied.as_ref().map_or(0, |id| id.index),
            "loaded applied state"
        );

        *self.applied.write().await = state.last_applied;
        *self.membership.write().await = state.membership;
        Ok(())
    }
}

/// Builds placeholder snapshots stamped with the applied position.
pub struct LedgerSnapshotBuilder<S: Store> {
    store: Arc<RaftStateMachineStore<S>>,
}

impl<S: Store> RaftSnapshotBuilder<TypeConfig> for LedgerSnapshotBuilder<S> {
    async fn build_snapshot(&mut self) -> Result<Snapshot<TypeConfig>, StorageError<TypeConfig>> {
        let last_log_id = self.store.applied.read().await.clone();
        let last_membership = self.store.membership.read().await.clone();

        let meta = SnapshotMeta {
            snapshot_id: format!("snapshot-{}", last_log_id.as_ref().map_or(0, |id| id.index)),
            last_log_id,
            last_membership,
        };
        *self.store.snapshot.write().await = Some(meta.clone());

        Ok(Snapshot {
            meta,
            snapshot: Cursor::new(self.store.ledger.snapshot().into_bytes()),
        })
    }
}

impl<S: Store> RaftStateMachine<TypeConfig> for Arc<RaftStateMachineStore<S>> {
    type SnapshotBuilder = LedgerSnapshotBuilder<S>;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<LogId<TypeConfig>>, StoredMembership<TypeConfig>), StorageError<TypeConfig>>
    {
        self.load_applied_state().await?;

        let applied = self.applied.read().await.clone();
        let membership = self.membership.read().await.clone();
        Ok((applied, membership))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<ApplyResult>, StorageError<TypeConfig>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + Send,
        I::IntoIter: Send,
    {
        let mut responses = Vec::new();

        for entry in entries {
            let log_id = entry.log_id.clone();

            let response = match entry.payload {
                EntryPayload::Blank => ApplyResult::default(),
                EntryPayload::Normal(command) => self.ledger.apply(&command.0).await,
                EntryPayload::Membership(membership) => {
                    debug!(index = log_id.index, "applying membership change");
                    *self.membership.write().await =
                        StoredMembership::new(Some(log_id.clone()), membership);
                    ApplyResult::default()
                }
            };

            *self.applied.write().await = Some(log_id);
            self.save_applied_state().await?;
            responses.push(response);
        }

        Ok(responses)
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Cursor<Vec<u8>>, StorageError<TypeConfig>> {
        Ok(Cursor::new(Vec::new()))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<TypeConfig>,
        snapshot: Cursor<Vec<u8>>,
    ) -> Result<(), StorageError<TypeConfig>> {
        let restored = self
            .ledger
            .restore(snapshot)
            .await
            .map_err(|e| StorageError::write(&e))?;
        info!(snapshot_id = %meta.snapshot_id, restored, "installed snapshot");

        *self.applied.write().await = meta.last_log_id.clone();
        *self.membership.write().await = meta.last_membership.clone();
        *self.snapshot.write().await = Some(meta.clone());
        self.save_applied_state().await?;

        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<Snapshot<TypeConfig>>, StorageError<TypeConfig>> {
        let meta = self.snapshot.read().await.clone();
        Ok(meta.map(|meta| Snapshot {
            meta,
            snapshot: Cursor::new(self.ledger.snapshot().into_bytes()),
        }))
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        LedgerSnapshotBuilder {
            store: Arc::clone(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_state_machine::{Command, Transaction, TransactionType};
    use ledger_store_memory::MemoryStore;
    use openraft::Membership;

    fn log_id(index: u64) -> LogId<TypeConfig> {
        openraft::testing::log_id::<TypeConfig>(1, "n1".to_string(), index)
    }

    fn normal(index: u64, command: &Command) -> Entry<TypeConfig> {
        Entry {
            log_id: log_id(index),
            payload: EntryPayload::Normal(command.encode().unwrap().into()),
        }
    }

    fn new_store() -> Arc<RaftStateMachineStore<MemoryStore>> {
        reopen(&MemoryStore::new())
    }

    fn reopen(store: &MemoryStore) -> Arc<RaftStateMachineStore<MemoryStore>> {
        Arc::new(RaftStateMachineStore::new(LedgerStateMachine::new(
            store.clone(),
        )))
    }

    fn trx(id: &str) -> Transaction {
        Transaction::new(id, TransactionType::First, 1.0, "USD")
    }

    #[tokio::test]
    async fn test_apply_tracks_position_and_results() {
        let mut sm = new_store();
        let entries = vec![
            Entry {
                log_id: log_id(1),
                payload: EntryPayload::Blank,
            },
            normal(2, &Command::set("k", serde_json::json!("v"))),
            normal(3, &Command::get("missing")),
        ];

        let results = sm.apply(entries).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results[0].is_err());
        assert!(!results[1].is_err());
        assert!(results[2].error.as_ref().unwrap().is_not_found());
        assert_eq!(sm.applied_index().await, 3);
    }

    #[tokio::test]
    async fn test_membership_entries_update_stored_membership() {
        let mut sm = new_store();
        let membership = Membership::new_with_defaults(
            vec![maplit::btreeset! {"n1".to_string()}],
            maplit::btreemap! {"n1".to_string() => openraft::BasicNode::new("127.0.0.1:1111")},
        );
        let entries = vec![Entry {
            log_id: log_id(1),
            payload: EntryPayload::Membership(membership),
        }];

        sm.apply(entries).await.unwrap();

        let (applied, stored) = sm.applied_state().await.unwrap();
        assert_eq!(applied, Some(log_id(1)));
        assert_eq!(stored.log_id(), &Some(log_id(1)));
    }

    #[tokio::test]
    async fn test_snapshot_is_empty_and_becomes_current() {
        let mut sm = new_store();
        assert!(sm.get_current_snapshot().await.unwrap().is_none());

        sm.apply(vec![normal(1, &Command::set("k", serde_json::json!(1)))])
            .await
            .unwrap();

        let mut builder = sm.get_snapshot_builder().await;
        let snapshot = builder.build_snapshot().await.unwrap();
        assert!(snapshot.snapshot.get_ref().is_empty());
        assert_eq!(snapshot.meta.last_log_id, Some(log_id(1)));

        let current = sm.get_current_snapshot().await.unwrap().unwrap();
        assert_eq!(current.meta.snapshot_id, "snapshot-1");
    }

    #[tokio::test]
    async fn test_install_snapshot_restores_records() {
        let mut sm = new_store();
        let meta = SnapshotMeta {
            last_log_id: Some(log_id(7)),
            last_membership: StoredMembership::default(),
            snapshot_id: "snapshot-7".to_string(),
        };
        let data = br#"{"operation":"SET","key":"a","value":1}
{"operation":"SET","key":"b","value":"two"}"#
            .to_vec();

        sm.install_snapshot(&meta, Cursor::new(data)).await.unwrap();

        assert_eq!(sm.applied_index().await, 7);
        assert!(sm.ledger().contains("a").await.unwrap());
        assert!(sm.ledger().contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_restart_resumes_after_last_applied_entry() {
        let store = MemoryStore::new();
        let mut sm = reopen(&store);
        let membership = Membership::new_with_defaults(
            vec![maplit::btreeset! {"n1".to_string()}],
            maplit::btreemap! {"n1".to_string() => openraft::BasicNode::new("127.0.0.1:1111")},
        );
        let log = vec![
            Entry {
                log_id: log_id(1),
                payload: EntryPayload::Membership(membership),
            },
            normal(2, &Command::set_transactions("o1", trx("t1"))),
            normal(3, &Command::delete("o1")),
            normal(4, &Command::set_transactions("o1", trx("t2"))),
        ];
        sm.apply(log.clone()).await.unwrap();
        assert_eq!(sm.ledger().transactions("o1").await.unwrap(), vec![trx("t2")]);

        let mut restarted = reopen(&store);
        let (applied, stored) = restarted.applied_state().await.unwrap();
        assert_eq!(applied, Some(log_id(4)));
        assert_eq!(stored.log_id(), &Some(log_id(1)));

        // openraft only hands over entries past the applied position.
        let pending: Vec<_> = log
            .into_iter()
            .filter(|entry| Some(&entry.log_id) > applied.as_ref())
            .collect();
        assert!(pending.is_empty());
        restarted.apply(pending).await.unwrap();

        assert_eq!(
            restarted.ledger().transactions("o1").await.unwrap(),
            vec![trx("t2")]
        );
    }

    #[tokio::test]
    async fn test_installed_snapshot_position_survives_restart() {
        let store = MemoryStore::new();
        let mut sm = reopen(&store);
        let meta = SnapshotMeta {
            last_log_id: Some(log_id(9)),
            last_membership: StoredMembership::default(),
            snapshot_id: "snapshot-9".to_string(),
        };
        sm.install_snapshot(&meta, Cursor::new(Vec::new()))
            .await
            .unwrap();

        let (applied, _) = reopen(&store).applied_state().await.unwrap();
        assert_eq!(applied, Some(log_id(9)));
    }
}
