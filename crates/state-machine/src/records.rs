//! Persisted record schemas.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Whether a transaction opened an order or was charged later against a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// The initial charge created by a payment.
    First,
    /// A follow-up charge authorised by a recurring token.
    Recurring,
}

impl TransactionType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Recurring => "recurring",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ledger entry. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    /// Globally unique id, doubles as the idempotency key.
    pub id: String,

    /// Transaction kind.
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// Charged amount.
    pub amount: f64,

    /// Currency code.
    pub currency: String,
}

impl Transaction {
    /// Creates a transaction with the given id.
    pub fn new(
        id: impl Into<String>,
        kind: TransactionType,
        amount: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            amount,
            currency: currency.into(),
        }
    }
}

/// The full attribute set of a payment, stored under its recurring token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentPayload {
    /// Card number.
    pub card_number: String,

    /// Card expiry.
    pub expired_at: String,

    /// Card verification value.
    pub cvv: String,

    /// Charged amount.
    pub amount: f64,

    /// Currency code.
    pub currency: String,

    /// Order the payment belongs to.
    pub order_id: String,
}

impl PaymentPayload {
    /// Derives the recurring token for this payment.
    ///
    /// The token is the hex SHA-1 of card number, expiry, cvv, amount (six
    /// fractional digits) and order id joined with `_`. Currency is not part
    /// of the token.
    #[must_use]
    pub fn recurring_token(&self) -> String {
        let material = format!(
            "{}_{}_{}_{:.6}_{}",
            self.card_number, self.expired_at, self.cvv, self.amount, self.order_id
        );

        let mut hasher = Sha1::new();
        hasher.update(material.as_bytes());
        hex::encode(hasher.finalize())
    }
}
