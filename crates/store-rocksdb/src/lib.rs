//! RocksDB implementation of the ledger key-value store.
//!
//! Mutations run inside a RocksDB transaction and are committed before the
//! call returns. Reads go straight to the database and see the latest
//! committed state.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
mod error;

pub use config::RocksStoreConfig;
pub use error::Error;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ledger_store::Store;
use rocksdb::{IteratorMode, MultiThreaded, Options, TransactionDB, TransactionDBOptions};
use tracing::{debug, info};

/// RocksDB-backed key-value store.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<TransactionDB<MultiThreaded>>,
    path: PathBuf,
}

impl fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RocksStore {
    /// Opens (or creates) the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if RocksDB refuses to open the directory.
    pub fn open(config: &RocksStoreConfig) -> Result<Self, Error> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(config.create_if_missing);

        let txn_opts = TransactionDBOptions::default();

        let db = TransactionDB::<MultiThreaded>::open(&db_opts, &txn_opts, &config.path).map_err(
            |source| Error::Open {
                path: config.path.display().to_string(),
                source,
            },
        )?;

        info!("opened rocksdb store at {}", config.path.display());

        Ok(Self {
            db: Arc::new(db),
            path: config.path.clone(),
        })
    }

    fn scan(&self) -> Result<Vec<(String, Bytes)>, Error> {
        let mut entries = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item?;
            let key = String::from_utf8(key.into_vec())?;
            entries.push((key, Bytes::from(value.into_vec())));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Store for RocksStore {
    type Error = Error;

    async fn del<K: Into<String> + Send>(&self, key: K) -> Result<(), Self::Error> {
        let key = key.into();
        let txn = self.db.transaction();
        txn.delete(key.as_bytes())?;
        txn.commit()?;
        debug!(%key, "deleted");
        Ok(())
    }

    async fn get<K: Into<String> + Send>(&self, key: K) -> Result<Option<Bytes>, Self::Error> {
        let key = key.into();
        Ok(self.db.get(key.as_bytes())?.map(Bytes::from))
    }

    async fn keys(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.scan()?.into_iter().map(|(key, _)| key).collect())
    }

    async fn put<K: Into<String> + Send>(&self, key: K, bytes: Bytes) -> Result<(), Self::Error> {
        let key = key.into();
        let txn = self.db.transaction();
        txn.put(key.as_bytes(), &bytes)?;
        txn.commit()?;
        debug!(%key, len = bytes.len(), "committed");
        Ok(())
    }

    async fn export(&self) -> Result<Vec<(String, Bytes)>, Self::Error> {
        self.scan()
    }
}
