//! Forwarded store command request/response message types.
//!
//! Used to forward a command from a follower to the current leader of its
//! group via the `Raft/StoreCommand` gRPC method.

/// Command forwarded from a follower to the leader.
///
/// The payload is the caller's uncompressed data; the leader compresses it
/// when it builds the log entry.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StoreCommandRequest {
    /// Replication group the command belongs to (`<database>-<store>`)
    #[prost(string, tag = "1")]
    pub group_id: String,

    /// `StoreAction` code
    #[prost(uint32, tag = "2")]
    pub action: u32,

    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

/// Leader's answer to a forwarded command.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StoreCommandResponse {
    /// True once the leader applied the command
    #[prost(bool, tag = "1")]
    pub status: bool,

    /// Reason when `status` is false. Empty on success.
    #[prost(string, tag = "2")]
    pub message: String,
}

impl StoreCommandResponse {
    pub fn ok() -> Self {
        Self {
            status: true,
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }
}
