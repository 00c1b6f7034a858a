//! Replicated command vocabulary and its wire form.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{PaymentPayload, Transaction};
use crate::result::ApplyError;

/// Operation names accepted on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Unconditional upsert.
    Set,
    /// Read through the log.
    Get,
    /// Unconditional removal.
    Delete,
    /// Idempotent ledger append.
    SetTransactions,
}

impl Operation {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Get => "GET",
            Self::Delete => "DELETE",
            Self::SetTransactions => "SET_TRANSACTIONS",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ApplyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = s.trim().to_uppercase();
        match canonical.as_str() {
            "SET" => Ok(Self::Set),
            "GET" => Ok(Self::Get),
            "DELETE" => Ok(Self::Delete),
            "SET_TRANSACTIONS" => Ok(Self::SetTransactions),
            _ => Err(ApplyError::UnknownOperation {
                operation: canonical,
            }),
        }
    }
}

/// Untyped wire record: `{operation, key, value}`.
///
/// Capitalised field names are accepted as well.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Operation name, case-insensitive.
    #[serde(alias = "Operation")]
    pub operation: String,

    /// Target key.
    #[serde(alias = "Key")]
    pub key: String,

    /// Operation specific payload.
    #[serde(alias = "Value", default)]
    pub value: Value,
}

/// A value written by `SET`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    /// Payment stored under its recurring token.
    Payment(PaymentPayload),
    /// A single transaction.
    Transaction(Transaction),
    /// An order ledger.
    Transactions(Vec<Transaction>),
    /// Anything else the wire carries.
    Raw(Value),
}

impl Record {
    /// Types a wire value, keeping it [`Raw`](Self::Raw) unless a typed
    /// variant re-encodes to exactly the same JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Decode`] if the value cannot be read at all.
    pub fn from_wire(value: Value) -> Result<Self, ApplyError> {
        let record: Self = serde_json::from_value(value.clone()).map_err(ApplyError::decode)?;
        let exact = matches!(record, Self::Raw(_))
            || serde_json::to_value(&record).ok().as_ref() == Some(&value);
        Ok(if exact { record } else { Self::Raw(value) })
    }

    /// Whether the value serialises to nothing and so must not be written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Raw(Value::Null))
    }
}

impl From<PaymentPayload> for Record {
    fn from(payment: PaymentPayload) -> Self {
        Self::Payment(payment)
    }
}

impl From<Transaction> for Record {
    fn from(transaction: Transaction) -> Self {
        Self::Transaction(transaction)
    }
}

impl From<Vec<Transaction>> for Record {
    fn from(transactions: Vec<Transaction>) -> Self {
        Self::Transactions(transactions)
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

/// A decoded command, one variant per operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Upsert `value` at `key`.
    Set {
        /// Target key.
        key: String,
        /// Value to store.
        value: Record,
    },
    /// Read `key`.
    Get {
        /// Target key.
        key: String,
    },
    /// Remove `key`.
    Delete {
        /// Target key.
        key: String,
    },
    /// Append `transaction` to the ledger at `key`.
    SetTransactions {
        /// Order id.
        key: String,
        /// Transaction to append.
        transaction: Transaction,
    },
}

impl Command {
    /// Builds a `SET` command.
    pub fn set(key: impl Into<String>, value: impl Into<Record>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds a `GET` command.
    pub fn get(key: impl Into<String>) -> Self {
        Self::Get { key: key.into() }
    }

    /// Builds a `DELETE` command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Builds a `SET_TRANSACTIONS` command.
    pub fn set_transactions(order_id: impl Into<String>, transaction: Transaction) -> Self {
        Self::SetTransactions {
            key: order_id.into(),
            transaction,
        }
    }

    /// The command's operation.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Set { .. } => Operation::Set,
            Self::Get { .. } => Operation::Get,
            Self::Delete { .. } => Operation::Delete,
            Self::SetTransactions { .. } => Operation::SetTransactions,
        }
    }

    /// The key the command targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::Get { key }
            | Self::Delete { key }
            | Self::SetTransactions { key, .. } => key,
        }
    }

    /// Converts to the untyped wire record.
    ///
    /// # Errors
    ///
    /// Fails if the payload cannot be represented as JSON.
    pub fn to_record(&self) -> Result<CommandRecord, ApplyError> {
        let value = match self {
            Self::Set { value, .. } => {
                serde_json::to_value(value).map_err(ApplyError::serialization)?
            }
            Self::Get { .. } | Self::Delete { .. } => Value::Null,
            Self::SetTransactions { transaction, .. } => {
                serde_json::to_value(transaction).map_err(ApplyError::serialization)?
            }
        };

        Ok(CommandRecord {
            operation: self.operation().as_str().to_string(),
            key: self.key().to_string(),
            value,
        })
    }

    /// Encodes the command for submission to the log.
    ///
    /// # Errors
    ///
    /// Fails if the payload cannot be represented as JSON.
    pub fn encode(&self) -> Result<Bytes, ApplyError> {
        let record = self.to_record()?;
        serde_json::to_vec(&record)
            .map(Bytes::from)
            .map_err(ApplyError::serialization)
    }

    /// Decodes a command from its wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Decode`] for malformed bytes or payloads and
    /// [`ApplyError::UnknownOperation`] for names outside the vocabulary.
    pub fn decode(bytes: &[u8]) -> Result<Self, ApplyError> {
        let record: CommandRecord = serde_json::from_slice(bytes).map_err(ApplyError::decode)?;
        Self::try_from(record)
    }
}

impl TryFrom<CommandRecord> for Command {
    type Error = ApplyError;

    fn try_from(record: CommandRecord) -> Result<Self, Self::Error> {
        let CommandRecord {
            operation,
            key,
            value,
        } = record;

        Ok(match operation.parse::<Operation>()? {
            Operation::Set => Self::Set {
                key,
                value: Record::from_wire(value)?,
            },
            Operation::Get => Self::Get { key },
            Operation::Delete => Self::Delete { key },
            Operation::SetTransactions => Self::SetTransactions {
                key,
                transaction: serde_json::from_value(value).map_err(ApplyError::decode)?,
            },
        })
    }
}
