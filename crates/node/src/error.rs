use std::path::PathBuf;

use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a node from starting.
#[derive(Debug, Error)]
pub enum Error {
    /// Consensus layer error.
    #[error(transparent)]
    Consensus(#[from] ledger_consensus::Error),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The restore file could not be opened.
    #[error("failed to open restore file {}: {source}", .path.display())]
    RestoreFile {
        /// Path given on the command line.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Restoring the local store failed.
    #[error(transparent)]
    Restore(#[from] ledger_state_machine::Error),

    /// The RocksDB store could not be opened.
    #[error(transparent)]
    Store(#[from] ledger_store_rocksdb::Error),
}
