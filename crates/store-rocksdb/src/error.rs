use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be opened.
    #[error("failed to open rocksdb at {path}: {source}")]
    Open {
        /// Path that was opened.
        path: String,
        /// Underlying rocksdb error.
        #[source]
        source: rocksdb::Error,
    },

    /// A read, write or commit failed.
    #[error("rocksdb error: {0}")]
    Backend(#[from] rocksdb::Error),

    /// A stored key was not valid UTF-8.
    #[error("stored key is not valid utf-8")]
    InvalidKey(#[from] std::string::FromUtf8Error),
}
