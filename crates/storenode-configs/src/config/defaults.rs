// Default value functions

pub fn default_rpc_addr() -> String {
    "127.0.0.1:8090".to_string()
}

pub fn default_peer_id() -> String {
    "127.0.0.1:8090".to_string()
}

pub fn default_group_peers() -> String {
    "127.0.0.1:8090".to_string()
}

pub fn default_raft_path() -> String {
    "./raft-data".to_string() // Normalized to absolute at runtime
}

pub fn default_election_timeout_ms() -> u64 {
    10_000
}

pub fn default_snapshot_interval_secs() -> u64 {
    3600
}

pub fn default_replication_buffer_size() -> u64 {
    32_768
}

pub fn default_rpc_thread_pool_size() -> usize {
    48
}

pub fn default_forward_timeout_ms() -> u64 {
    3000
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "compact".to_string()
}

pub fn default_stores() -> Vec<super::StoreSettings> {
    vec![super::StoreSettings {
        database: "storenode".to_string(),
        store: "default".to_string(),
    }]
}
