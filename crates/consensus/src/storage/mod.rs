//! Raft log storage backends.
//!
//! Both backends only persist the raft log and its metadata (vote, committed
//! and last purged log ids). Ledger state lives in the ledger store, driven by
//! [`RaftStateMachineStore`](crate::RaftStateMachineStore).

mod memory;
mod rocksdb;

pub use memory::MemLogStore;
pub use openraft::storage::RaftLogStorage;
pub use rocksdb::RocksLogStore;
