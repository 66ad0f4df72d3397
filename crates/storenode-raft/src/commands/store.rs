//! Store actions and commands

use std::fmt;

use serde::{Deserialize, Serialize};

use super::compression::{compress, decompress};
use crate::RaftError;

/// Kind of mutation carried by a [`StoreCommand`]
///
/// The numeric code is part of the log entry format and of the forward wire
/// message, so existing codes must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreAction {
    None,
    Init,
    Clear,
    Truncate,
    Put,
    Delete,
    Mutate,
    IncrCounter,
}

impl StoreAction {
    pub fn code(self) -> u8 {
        match self {
            StoreAction::None => 0,
            StoreAction::Init => 1,
            StoreAction::Clear => 2,
            StoreAction::Truncate => 3,
            StoreAction::Put => 4,
            StoreAction::Delete => 5,
            StoreAction::Mutate => 6,
            StoreAction::IncrCounter => 7,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, RaftError> {
        match code {
            0 => Ok(StoreAction::None),
            1 => Ok(StoreAction::Init),
            2 => Ok(StoreAction::Clear),
            3 => Ok(StoreAction::Truncate),
            4 => Ok(StoreAction::Put),
            5 => Ok(StoreAction::Delete),
            6 => Ok(StoreAction::Mutate),
            7 => Ok(StoreAction::IncrCounter),
            other => Err(RaftError::Serialization(format!("Unknown store action code: {}", other))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StoreAction::None => "none",
            StoreAction::Init => "init",
            StoreAction::Clear => "clear",
            StoreAction::Truncate => "truncate",
            StoreAction::Put => "put",
            StoreAction::Delete => "delete",
            StoreAction::Mutate => "mutate",
            StoreAction::IncrCounter => "incr_counter",
        }
    }
}

impl fmt::Display for StoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A state-changing command against a store. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCommand {
    action: StoreAction,
    data: Vec<u8>,
}

impl StoreCommand {
    pub fn new(action: StoreAction, data: impl Into<Vec<u8>>) -> Self {
        Self {
            action,
            data: data.into(),
        }
    }

    pub fn action(&self) -> StoreAction {
        self.action
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// `[action code][data]`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() + 1);
        bytes.push(self.action.code());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RaftError> {
        let (code, data) = bytes
            .split_first()
            .ok_or_else(|| RaftError::Serialization("Empty store command".to_string()))?;
        Ok(Self::new(StoreAction::from_code(*code)?, data.to_vec()))
    }

    /// Log entry form: `[action code][gzip(data)]`
    pub fn to_entry(&self) -> Result<Vec<u8>, RaftError> {
        let compressed = compress(&self.data)?;
        let mut entry = Vec::with_capacity(compressed.len() + 1);
        entry.push(self.action.code());
        entry.extend_from_slice(&compressed);
        Ok(entry)
    }

    /// Reverse of [`StoreCommand::to_entry`]
    pub fn from_entry(entry: &[u8]) -> Result<Self, RaftError> {
        let (code, compressed) = entry
            .split_first()
            .ok_or_else(|| RaftError::Serialization("Empty log entry".to_string()))?;
        Ok(Self::new(StoreAction::from_code(*code)?, decompress(compressed)?))
    }
}
