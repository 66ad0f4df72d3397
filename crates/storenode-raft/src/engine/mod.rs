//! Consensus engine contract
//!
//! [`RaftNode`](crate::RaftNode) only needs a narrow view of the engine:
//! who this peer is, whether it leads, who leads, and a non-blocking way to
//! hand it a log entry. [`OpenRaftEngine`] provides it on top of openraft.

mod openraft_engine;

use async_trait::async_trait;

use crate::{PeerId, StoreClosure};

pub use openraft_engine::{OpenRaftEngine, RaftInstance};

/// A log entry plus the closure to resolve once it is applied
#[derive(Debug)]
pub struct Task {
    pub data: Vec<u8>,
    pub done: StoreClosure,
}

impl Task {
    pub fn new(data: Vec<u8>, done: StoreClosure) -> Self {
        Self { data, done }
    }
}

#[async_trait]
pub trait RaftEngine: Send + Sync + 'static {
    /// This peer's identity in the group
    fn peer_id(&self) -> &PeerId;

    /// Point-in-time leadership check
    fn is_leader(&self) -> bool;

    /// Leader as last observed by this peer, if any
    fn current_leader(&self) -> Option<PeerId>;

    /// Enqueue an entry for replication. Never blocks; the task's closure is
    /// resolved once the entry is applied or refused.
    fn apply(&self, task: Task);

    /// Stop the engine. Tasks still queued are failed.
    async fn shutdown(&self);
}
