//! StoreStateMachine trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{RaftError, StoreCommand};

/// Result of applying a command to the state machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Command applied successfully with optional response data
    Ok(Vec<u8>),
    /// Command was a no-op (already applied)
    #[default]
    NoOp,
    /// Command failed with an error
    Error(String),
}

impl ApplyResult {
    /// Create a successful result with no data
    pub fn ok() -> Self {
        ApplyResult::Ok(Vec::new())
    }

    pub fn ok_with_data(data: Vec<u8>) -> Self {
        ApplyResult::Ok(data)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ApplyResult::Ok(_) | ApplyResult::NoOp)
    }

    /// Completion outcome delivered to the command's closure
    pub fn into_outcome(self) -> Result<Vec<u8>, RaftError> {
        match self {
            ApplyResult::Ok(data) => Ok(data),
            ApplyResult::NoOp => Ok(Vec::new()),
            ApplyResult::Error(e) => Err(RaftError::ApplyFailed(e)),
        }
    }
}

/// Backend store side of a replication group
///
/// Implementations are shared between the engine and the owner of the store,
/// so they use interior synchronization.
#[async_trait]
pub trait StoreStateMachine: Send + Sync + 'static {
    /// Apply a committed command
    ///
    /// # Arguments
    /// * `index` - The log index of this entry
    /// * `term` - The term when this entry was created
    /// * `command` - The decoded (uncompressed) command
    ///
    /// Entries are delivered in log order. An entry at or below the last
    /// applied index should be answered with `ApplyResult::NoOp`.
    async fn apply(&self, index: u64, term: u64, command: StoreCommand) -> Result<ApplyResult, RaftError>;

    /// Serialize the full state for a snapshot
    async fn snapshot(&self) -> Result<Vec<u8>, RaftError>;

    /// Replace the state with a snapshot produced by [`StoreStateMachine::snapshot`]
    async fn restore(&self, data: &[u8]) -> Result<(), RaftError>;
}
