//! Replicated state machine for the payment ledger.
//!
//! Committed commands are decoded from their wire form and applied, one at a
//! time, to a node-local [`Store`](ledger_store::Store). The same command
//! sequence applied on every replica yields the same store content.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod command;
mod error;
mod records;
mod result;
mod snapshot;
mod state_machine;

pub use command::{Command, CommandRecord, Operation, Record};
pub use error::{Error, Result};
pub use records::{PaymentPayload, Transaction, TransactionType};
pub use result::{ApplyError, ApplyResult};
pub use snapshot::SnapshotPlaceholder;
pub use state_machine::{APPLIED_STATE_KEY, LedgerStateMachine};
