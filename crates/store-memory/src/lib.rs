//! In-memory (single process) implementation of the ledger key-value store,
//! for tests and ephemeral nodes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ledger_store::Store;
use tokio::sync::RwLock;

/// In-memory key-value store.
///
/// Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    map: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Error = Error;

    async fn del<K: Into<String> + Send>(&self, key: K) -> Result<(), Self::Error> {
        self.map.write().await.remove(&key.into());
        Ok(())
    }

    async fn get<K: Into<String> + Send>(&self, key: K) -> Result<Option<Bytes>, Self::Error> {
        let map = self.map.read().await;
        Ok(map.get(&key.into()).cloned())
    }

    async fn keys(&self) -> Result<Vec<String>, Self::Error> {
        let map = self.map.read().await;
        Ok(map.keys().cloned().collect())
    }

    async fn put<K: Into<String> + Send>(&self, key: K, bytes: Bytes) -> Result<(), Self::Error> {
        self.map.write().await.insert(key.into(), bytes);
        Ok(())
    }

    async fn export(&self) -> Result<Vec<(String, Bytes)>, Self::Error> {
        let map = self.map.read().await;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
