use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main server configuration
///
/// Example server.toml:
/// ```toml
/// [rpc]
/// addr = "0.0.0.0:8091"
///
/// [raft]
/// peer_id = "10.0.0.1:8091"
/// group_peers = "10.0.0.1:8091,10.0.0.2:8091,10.0.0.3:8091"
/// path = "./raft-data"
/// election_timeout_ms = 10000
/// use_snapshot = true
///
/// [[stores]]
/// database = "hugegraph"
/// store = "g"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub rpc: RpcSettings,
    #[serde(default)]
    pub raft: RaftSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Backend stores hosted by this process; each one gets its own replication group
    #[serde(default = "default_stores")]
    pub stores: Vec<StoreSettings>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rpc: RpcSettings::default(),
            raft: RaftSettings::default(),
            logging: LoggingSettings::default(),
            stores: default_stores(),
        }
    }
}

/// Shared RPC listener settings (one listener serves every group in the process)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    /// Bind address of the shared RPC server
    #[serde(default = "default_rpc_addr")]
    pub addr: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            addr: default_rpc_addr(),
        }
    }
}

/// Raft settings shared by every replication group hosted in this process
///
/// The cluster section is FLAT (no nesting) so it maps one to one onto
/// the engine startup options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftSettings {
    /// This peer's identity, `host:port[:index]`
    #[serde(default = "default_peer_id")]
    pub peer_id: String,

    /// Initial peer set, comma separated `host:port[:index]` list
    #[serde(default = "default_group_peers")]
    pub group_peers: String,

    /// Durable root for log, meta and snapshot directories
    #[serde(default = "default_raft_path")]
    pub path: String,

    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_ms: u64,

    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,

    #[serde(default)]
    pub use_snapshot: bool,

    /// Maximum number of log entries shipped per replication payload
    #[serde(default = "default_replication_buffer_size")]
    pub replication_buffer_size: u64,

    /// Concurrent request limit per connection on the shared RPC server
    #[serde(default = "default_rpc_thread_pool_size")]
    pub rpc_thread_pool_size: usize,

    #[serde(default)]
    pub enable_metrics: bool,

    /// Upper bound for a follower waiting on a forwarded command
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,
}

impl Default for RaftSettings {
    fn default() -> Self {
        Self {
            peer_id: default_peer_id(),
            group_peers: default_group_peers(),
            path: default_raft_path(),
            election_timeout_ms: default_election_timeout_ms(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
            use_snapshot: false,
            replication_buffer_size: default_replication_buffer_size(),
            rpc_thread_pool_size: default_rpc_thread_pool_size(),
            enable_metrics: false,
            forward_timeout_ms: default_forward_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Optional per-target log level overrides:
    /// [logging.targets]
    /// openraft = "info"
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            targets: HashMap::new(),
        }
    }
}

/// A backend store whose writes go through a replication group.
///
/// The group id is derived from `<database>-<store>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub database: String,
    pub store: String,
}
