//! Error types for the Raft layer

use thiserror::Error;

/// Result type for Raft operations
pub type Result<T> = std::result::Result<T, RaftError>;

/// Errors that can occur in the Raft layer
///
/// Startup errors (`Config`, `Initialization`) abort node construction.
/// Per-command errors are delivered through the command's
/// [`StoreClosure`](crate::StoreClosure).
#[derive(Debug, Clone, Error)]
pub enum RaftError {
    /// Malformed peer id or peer-set string
    #[error("Configuration error: {0}")]
    Config(String),

    /// Directory creation or engine startup failed
    #[error("Failed to init raft node: {0}")]
    Initialization(String),

    /// The node is not the leader for this group
    #[error("Not leader for group {group}: leader is {}", .leader.as_deref().unwrap_or("unknown"))]
    NotLeader {
        group: String,
        leader: Option<String>,
    },

    /// Forward RPC timed out or failed at transport level
    #[error("Failed to invoke rpc request to leader {leader}: {reason}")]
    ForwardTransport {
        leader: String,
        reason: String,
    },

    /// The peer we forwarded to answered but declined the command
    #[error("Current node isn't leader, leader is [{leader}], failed to forward request to leader: {message}")]
    ForwardRejected {
        leader: String,
        message: String,
    },

    /// Engine or state machine failed to apply the command
    #[error("Failed to apply command: {0}")]
    ApplyFailed(String),

    /// Raft group not registered in this process
    #[error("Raft group not found: {0}")]
    GroupNotFound(String),

    /// Failed to serialize/deserialize
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network error during Raft communication
    #[error("Network error: {0}")]
    Network(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Raft is shutting down
    #[error("Raft is shutting down")]
    Shutdown,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RaftError {
    /// Create a NotLeader error
    pub fn not_leader(group: impl Into<String>, leader: Option<String>) -> Self {
        RaftError::NotLeader {
            group: group.into(),
            leader,
        }
    }

    /// Create an ApplyFailed error
    pub fn apply_failed(msg: impl Into<String>) -> Self {
        RaftError::ApplyFailed(msg.into())
    }

    /// Create a Storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        RaftError::Storage(msg.into())
    }

    /// Returns true if resubmitting the command might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RaftError::NotLeader { .. }
                | RaftError::ForwardTransport { .. }
                | RaftError::ForwardRejected { .. }
                | RaftError::Network(_)
        )
    }

    /// Returns the peer believed to be leader, if this error names one
    pub fn leader_hint(&self) -> Option<&str> {
        match self {
            RaftError::NotLeader { leader, .. } => leader.as_deref(),
            RaftError::ForwardTransport { leader, .. } | RaftError::ForwardRejected { leader, .. } => {
                Some(leader)
            }
            _ => None,
        }
    }
}

impl From<bincode::error::EncodeError> for RaftError {
    fn from(err: bincode::error::EncodeError) -> Self {
        RaftError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for RaftError {
    fn from(err: bincode::error::DecodeError) -> Self {
        RaftError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RaftError {
    fn from(err: std::io::Error) -> Self {
        RaftError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_rejected_names_leader_and_message() {
        let err = RaftError::ForwardRejected {
            leader: "host2:8002".to_string(),
            message: "not leader".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("host2:8002"));
        assert!(text.contains("not leader"));
        assert_eq!(err.leader_hint(), Some("host2:8002"));
    }

    #[test]
    fn test_retryable() {
        assert!(RaftError::not_leader("g", None).is_retryable());
        assert!(!RaftError::Config("bad".to_string()).is_retryable());
        assert!(!RaftError::apply_failed("boom").is_retryable());
    }

    #[test]
    fn test_not_leader_display_unknown() {
        let err = RaftError::not_leader("db-g", None);
        assert_eq!(err.to_string(), "Not leader for group db-g: leader is unknown");
        assert_eq!(err.leader_hint(), None);
    }
}
