//! OpenRaft Type Configuration

use std::fmt;
use std::io::Cursor;

use openraft::{Entry, RaftTypeConfig};
use serde::{Deserialize, Serialize};

use crate::state_machine::ApplyResult;

/// Type configuration for store replication groups
///
/// - `D`: log entry data (`[action][gzip(payload)]`)
/// - `R`: state machine apply result
/// - `NodeId`: position of the peer in the initial configuration, plus one
/// - `Node`: peer RPC address
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StoreTypeConfig;

impl RaftTypeConfig for StoreTypeConfig {
    type D = Vec<u8>;
    type R = ApplyResult;
    type NodeId = u64;
    type Node = PeerNode;
    type Entry = Entry<Self>;
    type SnapshotData = Cursor<Vec<u8>>;
    type AsyncRuntime = openraft::TokioRuntime;
    type Responder = openraft::impls::OneshotResponder<Self>;
}

/// Membership metadata for one peer
///
/// Do NOT use `skip_serializing_if` here: bincode is not self-describing and
/// needs every field present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PeerNode {
    /// RPC address of the peer (`host:port`)
    pub addr: String,
}

impl PeerNode {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl fmt::Display for PeerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}
