//! Bulk state transfer.
//!
//! Snapshots carry no state: every applied command is already durable in the
//! node-local store. Restore replays a stream of captured command records as
//! plain `SET`s, which is enough to seed a replica from another node's export
//! but not to install a real point-in-time image.

use std::io::Read;

use ledger_store::Store;
use serde_json::Value;
use tracing::{error, info};

use crate::command::{CommandRecord, Operation, Record};
use crate::error::{Error, Result};
use crate::state_machine::{APPLIED_STATE_KEY, LedgerStateMachine};

/// Stand-in snapshot: an empty payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotPlaceholder;

impl SnapshotPlaceholder {
    /// Serialised form handed to the consensus layer.
    #[must_use]
    pub const fn into_bytes(self) -> Vec<u8> {
        Vec::new()
    }
}

impl<S: Store> LedgerStateMachine<S> {
    /// Returns the placeholder snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> SnapshotPlaceholder {
        SnapshotPlaceholder
    }

    /// Replays captured command records from `reader`.
    ///
    /// Each record's value is written under its key with a plain `SET`,
    /// whatever its operation was. Ledger appends therefore land as
    /// overwrites. Keys absent from the stream are left as they are, and a
    /// record for the consensus bookkeeping key is skipped.
    /// Returns how many records were restored.
    ///
    /// # Errors
    ///
    /// The first decode or write failure stops the restore and is returned.
    pub async fn restore<R: Read + Send>(&self, reader: R) -> Result<usize> {
        let stream = serde_json::Deserializer::from_reader(reader).into_iter::<CommandRecord>();

        let mut restored = 0;
        for record in stream {
            let record = record.inspect_err(|e| error!("restore: decode failed: {e}"))?;
            if record.key == APPLIED_STATE_KEY {
                continue;
            }

            let result = self.set(&record.key, &Record::Raw(record.value)).await;
            if let Some(source) = result.error {
                error!("restore: writing {} failed: {source}", record.key);
                return Err(Error::Restore {
                    key: record.key,
                    source,
                });
            }

            restored += 1;
        }

        info!("restored {restored} records");
        Ok(restored)
    }

    /// Exports the whole local store as newline separated `SET` records
    /// suitable for [`restore`](Self::restore).
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read or holds a value that is not JSON.
    pub async fn capture(&self) -> Result<Vec<u8>> {
        let entries = self
            .store()
            .export()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        let mut out = Vec::new();
        for (key, bytes) in entries {
            if key == APPLIED_STATE_KEY {
                continue;
            }
            let value: Value = serde_json::from_slice(&bytes)?;
            let record = CommandRecord {
                operation: Operation::Set.as_str().to_string(),
                key,
                value,
            };
            serde_json::to_writer(&mut out, &record)?;
            out.push(b'\n');
        }

        Ok(out)
    }
}
