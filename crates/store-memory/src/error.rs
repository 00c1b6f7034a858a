use thiserror::Error;

/// Errors that can occur in this crate.
///
/// The in-memory store has no failure modes of its own; the type exists so
/// callers can treat every `Store` uniformly.
#[derive(Clone, Debug, Error)]
#[error("memory store error")]
pub struct Error;
