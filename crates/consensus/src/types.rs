//! Type definitions for the openraft-based engine

use std::io::Cursor;

use bytes::Bytes;
use ledger_state_machine::ApplyResult;
use serde::{Deserialize, Serialize};

/// Node identifier.
pub type NodeId = String;

/// An encoded command record as it travels through the raft log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBytes(pub Bytes);

impl From<Bytes> for CommandBytes {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

openraft::declare_raft_types!(
    /// Types for the ledger using RaftTypeConfig
    pub TypeConfig:
        D = CommandBytes,
        R = ApplyResult,
        NodeId = NodeId,
        Node = openraft::BasicNode,
        Entry = openraft::Entry<TypeConfig>,
        SnapshotData = Cursor<Vec<u8>>,
        AsyncRuntime = openraft::TokioRuntime,
);
