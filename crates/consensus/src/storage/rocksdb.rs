//! RocksDB raft log storage

use std::fmt::Debug;
use std::ops::{Bound, RangeBounds};
use std::path::Path;
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use openraft::storage::{IOFlushed, LogState, RaftLogReader, RaftLogStorage};
use openraft::{Entry, LogId, StorageError, Vote};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::TypeConfig;
use crate::error::{Error, Result};

const CF_META: &str = "meta";
const CF_LOGS: &str = "logs";

const KEY_VOTE: &str = "vote";
const KEY_COMMITTED: &str = "committed";
const KEY_LAST_PURGED: &str = "last_purged";

#[derive(Debug, thiserror::Error)]
#[error("column family `{0}` not found")]
struct MissingColumnFamily(&'static str);

/// Raft log persisted in RocksDB.
///
/// Entries live in the `logs` column family keyed by big-endian index, so
/// iteration order is log order. Vote, committed and last purged ids live in
/// `meta`. Values are CBOR.
#[derive(Debug, Clone)]
pub struct RocksLogStore {
    db: Arc<DB>,
}

impl RocksLogStore {
    /// Opens (or creates) the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if RocksDB cannot open the directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
            ColumnFamilyDescriptor::new(CF_LOGS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cfs).map_err(|e| {
            Error::Storage(format!(
                "failed to open raft log at {}: {e}",
                path.as_ref().display()
            ))
        })?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, StorageError<TypeConfig>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::read(&MissingColumnFamily(name)))
    }

    fn get_meta<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError<TypeConfig>> {
        let Some(bytes) = self
            .db
            .get_cf(self.cf(CF_META)?, key)
            .map_err(|e| StorageError::read(&e))?
        else {
            return Ok(None);
        };

        let value = ciborium::from_reader(bytes.as_slice()).map_err(|e| StorageError::read(&e))?;
        Ok(Some(value))
    }

    fn put_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError<TypeConfig>> {
        let mut buffer = Vec::new();
        ciborium::into_writer(value, &mut buffer).map_err(|e| StorageError::write(&e))?;

        self.db
            .put_cf(self.cf(CF_META)?, key, buffer)
            .map_err(|e| StorageError::write(&e))
    }

    fn flush(&self) -> Result<(), StorageError<TypeConfig>> {
        self.db.flush_wal(true).map_err(|e| StorageError::write(&e))
    }

    fn decode_entry(bytes: &[u8]) -> Result<Entry<TypeConfig>, StorageError<TypeConfig>> {
        ciborium::from_reader(bytes).map_err(|e| StorageError::read(&e))
    }
}

fn id_to_bin(id: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    // Writing into a Vec cannot fail.
    let _ = buf.write_u64::<BigEndian>(id);
    buf
}

fn bin_to_id(mut buf: &[u8]) -> Result<u64, StorageError<TypeConfig>> {
    buf.read_u64::<BigEndian>()
        .map_err(|e| StorageError::read(&e))
}

impl RaftLogReader<TypeConfig> for RocksLogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug + Send>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<TypeConfig>> {
        let start = match range.start_bound() {
            Bound::Included(x) => id_to_bin(*x),
            Bound::Excluded(x) => id_to_bin(*x + 1),
            Bound::Unbounded => id_to_bin(0),
        };

        let mut entries = Vec::new();
        let iter = self.db.iterator_cf(
            self.cf(CF_LOGS)?,
            IteratorMode::From(&start, Direction::Forward),
        );

        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::read(&e))?;
            let index = bin_to_id(&key)?;
            if !range.contains(&index) {
                break;
            }
            entries.push(Self::decode_entry(&value)?);
        }

        Ok(entries)
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<TypeConfig>>, StorageError<TypeConfig>> {
        self.get_meta(KEY_VOTE)
    }
}

impl RaftLogStorage<TypeConfig> for RocksLogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, StorageError<TypeConfig>> {
        let last = self
            .db
            .iterator_cf(self.cf(CF_LOGS)?, IteratorMode::End)
            .next();

        let last_log_id = match last {
            Some(item) => {
                let (_, value) = item.map_err(|e| StorageError::read(&e))?;
                Some(Self::decode_entry(&value)?.log_id)
            }
            None => None,
        };

        let last_purged_log_id: Option<LogId<TypeConfig>> = self.get_meta(KEY_LAST_PURGED)?;
        let last_log_id = last_log_id.or_else(|| last_purged_log_id.clone());

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }

    async fn save_vote(&mut self, vote: &Vote<TypeConfig>) -> Result<(), StorageError<TypeConfig>> {
        self.put_meta(KEY_VOTE, vote)?;
        self.flush()
    }

    async fn save_committed(
        &mut self,
        committed: Option<LogId<TypeConfig>>,
    ) -> Result<(), StorageError<TypeConfig>> {
        self.put_meta(KEY_COMMITTED, &committed)?;
        self.flush()
    }

    async fn read_committed(
        &mut self,
    ) -> Result<Option<LogId<TypeConfig>>, StorageError<TypeConfig>> {
        Ok(self
            .get_meta::<Option<LogId<TypeConfig>>>(KEY_COMMITTED)?
            .flatten())
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
        let cf = self.cf(CF_LOGS)?;
        for entry in entries {
            let mut buffer = Vec::new();
            ciborium::into_writer(&entry, &mut buffer).map_err(|e| StorageError::write(&e))?;
            self.db
                .put_cf(cf, id_to_bin(entry.log_id.index), buffer)
                .map_err(|e| StorageError::write(&e))?;
        }
        self.flush()?;

        // On error the callback is dropped, which openraft treats as a failed flush.
        callback.io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: LogId<TypeConfig>) -> Result<(), StorageError<TypeConfig>> {
        tracing::debug!("truncate: [{:?}, +oo)", log_id);

        self.db
            .delete_range_cf(
                self.cf(CF_LOGS)?,
                id_to_bin(log_id.index),
                id_to_bin(u64::MAX),
            )
            .map_err(|e| StorageError::write(&e))?;

        // delete_range is end-exclusive
        self.db
            .delete_cf(self.cf(CF_LOGS)?, id_to_bin(u64::MAX))
            .map_err(|e| StorageError::write(&e))?;

        self.flush()
    }

    async fn purge(&mut self, log_id: LogId<TypeConfig>) -> Result<(), StorageError<TypeConfig>> {
        tracing::debug!("purge: [0, {:?}]", log_id);

        // Record the purge point before dropping entries.
        self.put_meta(KEY_LAST_PURGED, &log_id)?;

        self.db
            .delete_range_cf(
                self.cf(CF_LOGS)?,
                id_to_bin(0),
                id_to_bin(log_id.index + 1),
            )
            .map_err(|e| StorageError::write(&e))?;

        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_keys_sort_numerically() {
        let mut keys = vec![id_to_bin(256), id_to_bin(2), id_to_bin(1)];
        keys.sort();
        let ids: Vec<u64> = keys.iter().map(|k| bin_to_id(k).unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 256]);
    }

    #[test]
    fn test_short_key_is_a_read_error() {
        assert!(bin_to_id(&[0, 1]).is_err());
    }
}
