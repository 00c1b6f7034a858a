use thiserror::Error;

/// Result type used by the router.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A follower argument was not of the form `name=raft_address`.
    #[error("invalid follower '{0}': expected name=raft_address")]
    InvalidFollower(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),
}
