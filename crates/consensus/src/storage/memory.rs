//! In-memory raft log storage

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::RangeBounds;
use std::sync::Arc;

use openraft::storage::{IOFlushed, LogState, RaftLogReader, RaftLogStorage};
use openraft::{Entry, LogId, StorageError, Vote};
use tokio::sync::RwLock;

use crate::TypeConfig;

/// Raft log kept in process memory. Lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemLogStore {
    /// Current vote state
    vote: Arc<RwLock<Option<Vote<TypeConfig>>>>,
    /// Last committed log id
    committed: Arc<RwLock<Option<LogId<TypeConfig>>>>,
    /// Log entries by index
    log: Arc<RwLock<BTreeMap<u64, Entry<TypeConfig>>>>,
    /// Last purged log id
    last_purged: Arc<RwLock<Option<LogId<TypeConfig>>>>,
}

impl MemLogStore {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RaftLogReader<TypeConfig> for MemLogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + Send>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<TypeConfig>> {
        let log = self.log.read().await;
        Ok(log.range(range).map(|(_, entry)| entry.clone()).collect())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<TypeConfig>>, StorageError<TypeConfig>> {
        Ok(self.vote.read().await.clone())
    }
}

impl RaftLogStorage<TypeConfig> for MemLogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, StorageError<TypeConfig>> {
        let log = self.log.read().await;
        let last_purged_log_id = self.last_purged.read().await.clone();

        let last_log_id = log
            .values()
            .next_back()
            .map(|entry| entry.log_id.clone())
            .or_else(|| last_purged_log_id.clone());

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }

    async fn save_vote(&mut self, vote: &Vote<TypeConfig>) -> Result<(), StorageError<TypeConfig>> {
        *self.vote.write().await = Some(vote.clone());
        Ok(())
    }

    async fn save_committed(
        &mut self,
        committed: Option<LogId<TypeConfig>>,
    ) -> Result<(), StorageError<TypeConfig>> {
        *self.committed.write().await = committed;
        Ok(())
    }

    async fn read_committed(
        &mut self,
    ) -> Result<Option<LogId<TypeConfig>>, StorageError<TypeConfig>> {
        Ok(self.committed.read().await.clone())
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: IOFlushed<TypeConfig>,
    ) -> Result<(), StorageError<TypeConfig>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + Send,
        I::IntoIter: Send,
    {
        let mut log = self.log.write().await;
        for entry in entries {
            log.insert(entry.log_id.index, entry);
        }

        callback.io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: LogId<TypeConfig>) -> Result<(), StorageError<TypeConfig>> {
        tracing::debug!("truncate: [{:?}, +oo)", log_id);

        let mut log = self.log.write().await;
        log.split_off(&log_id.index);
        Ok(())
    }

    async fn purge(&mut self, log_id: LogId<TypeConfig>) -> Result<(), StorageError<TypeConfig>> {
        tracing::debug!("purge: [0, {:?}]", log_id);

        let mut log = self.log.write().await;
        let kept = log.split_off(&(log_id.index + 1));
        *log = kept;

        *self.last_purged.write().await = Some(log_id);
        Ok(())
    }
}
