//! In-memory state machine
//!
//! Keeps every applied command in log order. Used by the binary when no
//! backend store is attached and by the tests to observe what was applied.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{decode, encode, ApplyResult, StoreStateMachine};
use crate::{RaftError, StoreAction, StoreCommand};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct MemoryState {
    last_applied_index: u64,
    last_applied_term: u64,
    commands: Vec<StoreCommand>,
    counter: i64,
}

/// State machine that records applied commands in memory
#[derive(Debug, Default)]
pub struct MemoryStateMachine {
    state: RwLock<MemoryState>,
}

impl MemoryStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands applied so far, in log order
    pub fn applied(&self) -> Vec<StoreCommand> {
        self.state.read().commands.clone()
    }

    pub fn last_applied_index(&self) -> u64 {
        self.state.read().last_applied_index
    }

    /// Sum of all `IncrCounter` deltas (8 byte little-endian payloads)
    pub fn counter(&self) -> i64 {
        self.state.read().counter
    }
}

#[async_trait]
impl StoreStateMachine for MemoryStateMachine {
    async fn apply(&self, index: u64, term: u64, command: StoreCommand) -> Result<ApplyResult, RaftError> {
        let mut state = self.state.write();
        if index <= state.last_applied_index {
            return Ok(ApplyResult::NoOp);
        }

        state.last_applied_index = index;
        state.last_applied_term = term;

        let result = match command.action() {
            StoreAction::Clear | StoreAction::Truncate => {
                state.commands.clear();
                state.counter = 0;
                ApplyResult::ok()
            }
            StoreAction::IncrCounter => match <[u8; 8]>::try_from(command.data()) {
                Ok(delta) => match state.counter.checked_add(i64::from_le_bytes(delta)) {
                    Some(counter) => {
                        state.counter = counter;
                        ApplyResult::ok_with_data(counter.to_le_bytes().to_vec())
                    }
                    None => ApplyResult::Error("counter overflow".to_string()),
                },
                Err(_) => ApplyResult::Error(format!(
                    "counter delta must be 8 bytes, got {}",
                    command.data().len()
                )),
            },
            _ => ApplyResult::ok(),
        };

        state.commands.push(command);
        Ok(result)
    }

    async fn snapshot(&self) -> Result<Vec<u8>, RaftError> {
        let state = self.state.read().clone();
        encode(&state)
    }

    async fn restore(&self, data: &[u8]) -> Result<(), RaftError> {
        let restored: MemoryState = decode(data)?;
        *self.state.write() = restored;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_in_order_and_skip_duplicates() {
        let sm = MemoryStateMachine::new();
        let put = StoreCommand::new(StoreAction::Put, b"k1".to_vec());

        assert_eq!(sm.apply(1, 1, put.clone()).await.unwrap(), ApplyResult::ok());
        assert_eq!(sm.apply(1, 1, put.clone()).await.unwrap(), ApplyResult::NoOp);
        assert_eq!(sm.applied(), vec![put]);
        assert_eq!(sm.last_applied_index(), 1);
    }

    #[tokio::test]
    async fn test_incr_counter() {
        let sm = MemoryStateMachine::new();
        let incr = |n: i64| StoreCommand::new(StoreAction::IncrCounter, n.to_le_bytes().to_vec());

        sm.apply(1, 1, incr(5)).await.unwrap();
        let result = sm.apply(2, 1, incr(-2)).await.unwrap();
        assert_eq!(result, ApplyResult::ok_with_data(3i64.to_le_bytes().to_vec()));
        assert_eq!(sm.counter(), 3);

        let bad = sm
            .apply(3, 1, StoreCommand::new(StoreAction::IncrCounter, vec![1]))
            .await
            .unwrap();
        assert!(!bad.is_ok());
    }

    #[tokio::test]
    async fn test_incr_counter_overflow_is_rejected() {
        let sm = MemoryStateMachine::new();
        let incr = |n: i64| StoreCommand::new(StoreAction::IncrCounter, n.to_le_bytes().to_vec());

        sm.apply(1, 1, incr(i64::MAX)).await.unwrap();
        let result = sm.apply(2, 1, incr(i64::MAX)).await.unwrap();

        assert_eq!(result, ApplyResult::Error("counter overflow".to_string()));
        assert_eq!(result.into_outcome().unwrap_err().to_string(), "Failed to apply command: counter overflow");
        assert_eq!(sm.counter(), i64::MAX);
        assert_eq!(sm.last_applied_index(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_restore() {
        let sm = MemoryStateMachine::new();
        sm.apply(1, 1, StoreCommand::new(StoreAction::Put, b"a".to_vec())).await.unwrap();
        sm.apply(2, 1, StoreCommand::new(StoreAction::Delete, b"a".to_vec())).await.unwrap();

        let snapshot = sm.snapshot().await.unwrap();
        let restored = MemoryStateMachine::new();
        restored.restore(&snapshot).await.unwrap();

        assert_eq!(restored.applied(), sm.applied());
        assert_eq!(restored.last_applied_index(), 2);
    }
}
