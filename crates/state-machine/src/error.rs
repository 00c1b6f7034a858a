use thiserror::Error;

use crate::ApplyError;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the bulk snapshot paths (restore and capture).
///
/// Per-command failures are not errors at this level; they travel back to the
/// submitter inside an [`ApplyResult`](crate::ApplyResult).
#[derive(Debug, Error)]
pub enum Error {
    /// A record in the restore stream could not be decoded.
    #[error("failed to decode restore stream: {0}")]
    Decode(#[from] serde_json::Error),

    /// A decoded record could not be written.
    #[error("failed to restore key {key}: {source}")]
    Restore {
        /// Key being written.
        key: String,
        /// Underlying failure.
        #[source]
        source: ApplyError,
    },

    /// The store could not be read while capturing.
    #[error("store error: {0}")]
    Store(String),
}
