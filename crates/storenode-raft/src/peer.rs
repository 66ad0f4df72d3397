//! Peer identity and initial group configuration
//!
//! - [`PeerId`]: `host:port[:index]`, the identity of one peer in a group
//! - [`Configuration`]: the initial peer set, parsed from a comma separated list
//!
//! Engine node ids are positional: the n-th peer of the initial configuration
//! gets node id `n + 1`. Every peer parses the same configuration string, so
//! they all agree on the mapping.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RaftError;

/// Identity of a peer: an RPC endpoint plus an index.
///
/// The index only takes part in identity and node id assignment. Requests
/// are routed by endpoint and group, so peers of the same group need
/// distinct endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId {
    host: String,
    port: u16,
    index: u32,
}

impl PeerId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            index: 0,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// RPC address of this peer (`host:port`)
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            write!(f, "{}:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}:{}", self.host, self.port, self.index)
        }
    }
}

impl FromStr for PeerId {
    type Err = RaftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RaftError::Config(format!("Failed to parse peer id '{}': {}", s, reason));

        let s = s.trim();
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid("expected host:port[:index]"));
        }

        let host = parts[0].trim();
        if host.is_empty() {
            return Err(invalid("empty host"));
        }

        let port: u16 = parts[1].trim().parse().map_err(|_| invalid("invalid port"))?;
        if port == 0 {
            return Err(invalid("port cannot be 0"));
        }

        let index = match parts.get(2) {
            Some(idx) => idx.trim().parse().map_err(|_| invalid("invalid index"))?,
            None => 0,
        };

        Ok(PeerId::new(host, port).with_index(index))
    }
}

/// Initial peer set of a replication group. Immutable after node start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    peers: Vec<PeerId>,
}

impl Configuration {
    pub fn new(peers: Vec<PeerId>) -> Result<Self, RaftError> {
        if peers.is_empty() {
            return Err(RaftError::Config("Initial configuration has no peers".to_string()));
        }

        let mut seen = HashSet::new();
        for peer in &peers {
            if !seen.insert(peer) {
                return Err(RaftError::Config(format!(
                    "Duplicate peer {} in initial configuration",
                    peer
                )));
            }
        }

        Ok(Self { peers })
    }

    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    /// Engine node id of `peer` (position + 1)
    pub fn node_id(&self, peer: &PeerId) -> Option<u64> {
        self.peers
            .iter()
            .position(|p| p == peer)
            .map(|pos| pos as u64 + 1)
    }

    /// Peer owning the engine node id `node_id`
    pub fn peer(&self, node_id: u64) -> Option<&PeerId> {
        node_id
            .checked_sub(1)
            .and_then(|pos| self.peers.get(pos as usize))
    }

    /// `(node id, peer)` pairs in configuration order
    pub fn members(&self) -> impl Iterator<Item = (u64, &PeerId)> {
        self.peers
            .iter()
            .enumerate()
            .map(|(pos, peer)| (pos as u64 + 1, peer))
    }
}

impl FromStr for Configuration {
    type Err = RaftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(RaftError::Config(format!("Failed to parse group peers '{}'", s)));
        }

        let peers = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PeerId::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Configuration::new(peers)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let peers: Vec<String> = self.peers.iter().map(ToString::to_string).collect();
        f.write_str(&peers.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer_id() {
        let peer: PeerId = "host1:8001".parse().unwrap();
        assert_eq!(peer.host(), "host1");
        assert_eq!(peer.port(), 8001);
        assert_eq!(peer.index(), 0);
        assert_eq!(peer.endpoint(), "host1:8001");
        assert_eq!(peer.to_string(), "host1:8001");
    }

    #[test]
    fn test_parse_peer_id_with_index() {
        let peer: PeerId = "10.0.0.1:8001:2".parse().unwrap();
        assert_eq!(peer.index(), 2);
        assert_eq!(peer.endpoint(), "10.0.0.1:8001");
        assert_eq!(peer.to_string(), "10.0.0.1:8001:2");
    }

    #[test]
    fn test_malformed_peer_ids() {
        for bad in ["", "host1", ":8001", "host1:port", "host1:0", "host1:8001:x", "a:1:2:3"] {
            let err = bad.parse::<PeerId>().unwrap_err();
            assert!(matches!(err, RaftError::Config(_)), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_parse_configuration() {
        let conf: Configuration = "host1:8001,host2:8002,host3:8003".parse().unwrap();
        assert_eq!(conf.peers().len(), 3);

        let host2: PeerId = "host2:8002".parse().unwrap();
        assert!(conf.contains(&host2));
        assert_eq!(conf.node_id(&host2), Some(2));
        assert_eq!(conf.peer(2), Some(&host2));
        assert_eq!(conf.peer(0), None);
        assert_eq!(conf.peer(4), None);
        assert_eq!(conf.to_string(), "host1:8001,host2:8002,host3:8003");
    }

    #[test]
    fn test_configuration_tolerates_whitespace() {
        let conf: Configuration = " host1:8001 , host2:8002 ,".parse().unwrap();
        assert_eq!(conf.peers().len(), 2);
    }

    #[test]
    fn test_malformed_configurations() {
        assert!("".parse::<Configuration>().is_err());
        assert!("   ".parse::<Configuration>().is_err());
        assert!(",,".parse::<Configuration>().is_err());
        assert!("host1:8001,bogus".parse::<Configuration>().is_err());
        assert!("host1:8001,host1:8001".parse::<Configuration>().is_err());
    }

    #[test]
    fn test_members_are_positional() {
        let conf: Configuration = "a:1,b:2".parse().unwrap();
        let members: Vec<(u64, String)> = conf.members().map(|(id, p)| (id, p.to_string())).collect();
        assert_eq!(members, vec![(1, "a:1".to_string()), (2, "b:2".to_string())]);
    }

    #[test]
    fn test_index_distinguishes_peers_on_one_endpoint() {
        let conf: Configuration = "a:1:0,a:1:1".parse().unwrap();
        let (first, second) = (&conf.peers()[0], &conf.peers()[1]);

        assert_ne!(first, second);
        assert_eq!(first.endpoint(), second.endpoint());
        assert_eq!(conf.node_id(first), Some(1));
        assert_eq!(conf.node_id(second), Some(2));
    }
}
