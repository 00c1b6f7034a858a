//! Abstract interface for the node-local persistent key-value store that
//! committed ledger commands are applied to.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

/// A trait representing a transactional key-value store with asynchronous operations.
///
/// Each mutating call commits in its own store transaction. Reads observe a
/// consistent snapshot and may run concurrently with an in-flight commit.
///
/// # Associated Types
/// - `Error`: The error type that implements `Debug`, `Error`, `Send`, and `Sync`.
///
/// # Required Methods
/// - `async fn del(&self, key: String) -> Result<(), Self::Error>`: Deletes a key. Deleting an absent key succeeds.
/// - `async fn get(&self, key: String) -> Result<Option<Bytes>, Self::Error>`: Retrieves the value associated with a key.
/// - `async fn keys(&self) -> Result<Vec<String>, Self::Error>`: Retrieves all keys in the store.
/// - `async fn put(&self, key: String, bytes: Bytes) -> Result<(), Self::Error>`: Upserts a key-value pair.
/// - `async fn export(&self) -> Result<Vec<(String, Bytes)>, Self::Error>`: Dumps the full keyspace in key order.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// The error type for the store.
    type Error: Debug + Error + Send + Sync + 'static;

    /// Deletes a key from the store.
    async fn del<K: Into<String> + Send>(&self, key: K) -> Result<(), Self::Error>;

    /// Retrieves the value associated with a key.
    async fn get<K: Into<String> + Send>(&self, key: K) -> Result<Option<Bytes>, Self::Error>;

    /// Retrieves all keys in the store.
    async fn keys(&self) -> Result<Vec<String>, Self::Error>;

    /// Stores a key-value pair, replacing any previous value.
    async fn put<K: Into<String> + Send>(&self, key: K, bytes: Bytes) -> Result<(), Self::Error>;

    /// Exports every key-value pair, sorted by key.
    async fn export(&self) -> Result<Vec<(String, Bytes)>, Self::Error>;
}
