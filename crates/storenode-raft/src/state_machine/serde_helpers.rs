//! Serialization helpers for bincode 2.x API compatibility.

use crate::error::RaftError;
use serde::{de::DeserializeOwned, Serialize};

/// Encode a value to bytes using bincode.
///
/// Uses the standard bincode 2.x configuration with variable int encoding.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RaftError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| RaftError::Serialization(e.to_string()))
}

/// Decode a value from bytes using bincode.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RaftError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| RaftError::Serialization(e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_payload_membership_roundtrip() {
        use crate::storage::{PeerNode, StoreTypeConfig};
        use openraft::{EntryPayload, Membership};
        use std::collections::BTreeMap;

        let mut nodes = BTreeMap::new();
        nodes.insert(1u64, PeerNode::new("127.0.0.1:8091"));
        nodes.insert(2u64, PeerNode::new("127.0.0.1:8092"));
        let membership: Membership<u64, PeerNode> = nodes.into();
        let payload: EntryPayload<StoreTypeConfig> = EntryPayload::Membership(membership);

        let bytes = encode(&payload).unwrap();
        let decoded: EntryPayload<StoreTypeConfig> = decode(&bytes).unwrap();

        match decoded {
            EntryPayload::Membership(m) => assert_eq!(m.nodes().count(), 2),
            _ => panic!("Decoded payload type mismatch"),
        }
    }

    #[test]
    fn test_truncated_input_fails() {
        let bytes = encode(&("group".to_string(), 42u64)).unwrap();
        let result: Result<(String, u64), _> = decode(&bytes[..2]);
        assert!(matches!(result, Err(RaftError::Serialization(_))));
    }
}
