use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a single command could not be applied.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyError {
    /// The key is absent from the store.
    #[error("key {key} does not exists")]
    NotFound {
        /// Missing key.
        key: String,
    },

    /// The operation name is not part of the command vocabulary.
    #[error("unknown operation {operation}")]
    UnknownOperation {
        /// Operation as received, after canonicalisation.
        operation: String,
    },

    /// The command or a stored value could not be decoded.
    #[error("unprocessable entity: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },

    /// A value could not be encoded for storage.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Encoder message.
        reason: String,
    },

    /// The key holds consensus bookkeeping and cannot be addressed.
    #[error("key {key} is reserved")]
    ReservedKey {
        /// Reserved key.
        key: String,
    },

    /// The store rejected a read or commit.
    #[error("store error: {reason}")]
    Storage {
        /// Store message.
        reason: String,
    },
}

impl ApplyError {
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub(crate) fn decode(err: impl ToString) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }

    pub(crate) fn serialization(err: impl ToString) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }

    pub(crate) fn storage(err: impl ToString) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }

    /// Whether this is a missing-key failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Outcome of applying one command, handed back to whoever submitted it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Failure, if any.
    pub error: Option<ApplyError>,

    /// Resulting value.
    pub data: Option<Value>,
}

impl ApplyResult {
    /// A successful result carrying `data`.
    #[must_use]
    pub const fn ok(data: Option<Value>) -> Self {
        Self { error: None, data }
    }

    /// A failed result.
    #[must_use]
    pub const fn err(error: ApplyError) -> Self {
        Self {
            error: Some(error),
            data: None,
        }
    }

    /// Whether the command failed.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Converts into a plain `Result`, dropping any sentinel data on failure.
    ///
    /// # Errors
    ///
    /// Returns the carried [`ApplyError`] if the command failed.
    pub fn into_result(self) -> Result<Option<Value>, ApplyError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}
