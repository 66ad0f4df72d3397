//! Raft Node Configuration
//!
//! Runtime configuration used by [`RaftNode::start`](super::RaftNode::start),
//! distinct from the TOML-parseable `storenode_configs::RaftSettings`. This
//! struct uses `Duration` for runtime convenience and is built from the TOML
//! settings with `From`.

use std::path::PathBuf;
use std::time::Duration;

use storenode_configs::RaftSettings;

use crate::GroupId;

/// Default upper bound for a forwarded command round trip
pub const DEFAULT_FORWARD_TIMEOUT_MS: u64 = 3000;

/// Engine tuning shared by every group of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftOptions {
    /// Lower bound of the election timeout. The upper bound is twice this
    /// value and the heartbeat interval a tenth of it.
    pub election_timeout: Duration,
    /// Period of the snapshot trigger (only used with `use_snapshot`)
    pub snapshot_interval: Duration,
    pub use_snapshot: bool,
    /// Maximum number of entries per replication payload
    pub replication_buffer_size: u64,
    /// Concurrent request limit per connection of the shared RPC server
    pub rpc_thread_pool_size: usize,
    /// Log every role/leader change of the group
    pub enable_metrics: bool,
    pub forward_timeout: Duration,
}

impl RaftOptions {
    pub fn election_timeout_min_ms(&self) -> u64 {
        self.election_timeout.as_millis() as u64
    }

    pub fn election_timeout_max_ms(&self) -> u64 {
        self.election_timeout_min_ms() * 2
    }

    pub fn heartbeat_interval_ms(&self) -> u64 {
        (self.election_timeout_min_ms() / 10).max(1)
    }
}

impl Default for RaftOptions {
    fn default() -> Self {
        Self::from(&RaftSettings::default())
    }
}

impl From<&RaftSettings> for RaftOptions {
    fn from(settings: &RaftSettings) -> Self {
        Self {
            election_timeout: Duration::from_millis(settings.election_timeout_ms),
            snapshot_interval: Duration::from_secs(settings.snapshot_interval_secs),
            use_snapshot: settings.use_snapshot,
            replication_buffer_size: settings.replication_buffer_size,
            rpc_thread_pool_size: settings.rpc_thread_pool_size,
            enable_metrics: settings.enable_metrics,
            forward_timeout: Duration::from_millis(settings.forward_timeout_ms),
        }
    }
}

/// Everything [`RaftNode::start`](super::RaftNode::start) needs for one group
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub group: GroupId,
    /// This peer, `host:port[:index]`
    pub peer_id: String,
    /// Initial peer set, comma separated
    pub group_peers: String,
    /// Root of the group's log, meta and snapshot directories
    pub raft_path: PathBuf,
    pub options: RaftOptions,
}

impl NodeConfig {
    pub fn from_settings(group: GroupId, settings: &RaftSettings) -> Self {
        Self {
            group,
            peer_id: settings.peer_id.clone(),
            group_peers: settings.group_peers.clone(),
            raft_path: PathBuf::from(&settings.path),
            options: RaftOptions::from(settings),
        }
    }
}
