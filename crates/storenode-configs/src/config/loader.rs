use super::types::ServerConfig;
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl ServerConfig {
    /// Load configuration from a TOML file
    ///
    /// Note: Environment overrides are applied separately via `apply_env_overrides()`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and finalize it
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: ServerConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

        config.finalize()?;

        Ok(config)
    }

    /// Override raft identity and paths from `STORENODE_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("STORENODE_RPC_ADDR") {
            self.rpc.addr = addr;
        }
        if let Some(peer_id) = lookup("STORENODE_PEER_ID") {
            self.raft.peer_id = peer_id;
        }
        if let Some(peers) = lookup("STORENODE_GROUP_PEERS") {
            self.raft.group_peers = peers;
        }
        if let Some(path) = lookup("STORENODE_RAFT_PATH") {
            self.raft.path = path;
        }
    }

    /// Normalize directory-like paths to absolute paths for consistent runtime behavior.
    fn normalize_paths(&mut self) {
        let path = PathBuf::from(&self.raft.path);
        if path.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                self.raft.path = cwd.join(path).to_string_lossy().into_owned();
            }
        }
    }

    /// Normalize local filesystem paths and validate configuration.
    ///
    /// Call this after applying environment overrides.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        self.normalize_paths();

        self.validate()?;

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> anyhow::Result<()> {
        self.rpc
            .addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("Invalid rpc.addr '{}': {}", self.rpc.addr, e))?;

        if self.raft.peer_id.trim().is_empty() {
            return Err(anyhow::anyhow!("raft.peer_id cannot be empty"));
        }

        if self.raft.group_peers.trim().is_empty() {
            return Err(anyhow::anyhow!("raft.group_peers cannot be empty"));
        }

        if self.raft.path.trim().is_empty() {
            return Err(anyhow::anyhow!("raft.path cannot be empty"));
        }

        if self.raft.election_timeout_ms == 0 {
            return Err(anyhow::anyhow!("raft.election_timeout_ms cannot be 0"));
        }

        if self.raft.use_snapshot && self.raft.snapshot_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "raft.snapshot_interval_secs cannot be 0 when snapshots are enabled"
            ));
        }

        if self.raft.forward_timeout_ms == 0 {
            return Err(anyhow::anyhow!("raft.forward_timeout_ms cannot be 0"));
        }

        if self.raft.rpc_thread_pool_size == 0 {
            return Err(anyhow::anyhow!("raft.rpc_thread_pool_size cannot be 0"));
        }

        if self.raft.replication_buffer_size == 0 {
            return Err(anyhow::anyhow!("raft.replication_buffer_size cannot be 0"));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            ));
        }

        let valid_formats = ["compact", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            ));
        }

        for (target, level) in &self.logging.targets {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}' for target '{}'. Must be one of: {}",
                    level,
                    target,
                    VALID_LEVELS.join(", ")
                ));
            }
        }

        if self.stores.is_empty() {
            return Err(anyhow::anyhow!("At least one [[stores]] entry is required"));
        }

        let mut seen = HashSet::new();
        for store in &self.stores {
            if store.database.trim().is_empty() || store.store.trim().is_empty() {
                return Err(anyhow::anyhow!("Store database and name cannot be empty"));
            }
            if !seen.insert((store.database.as_str(), store.store.as_str())) {
                return Err(anyhow::anyhow!(
                    "Duplicate store '{}-{}'",
                    store.database,
                    store.store
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreSettings;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = ServerConfig::from_toml_str(
            r#"
            [raft]
            peer_id = "host1:8001"
            group_peers = "host1:8001,host2:8002,host3:8003"
            path = "/var/lib/storenode"
            election_timeout_ms = 5000
            use_snapshot = true

            [[stores]]
            database = "hugegraph"
            store = "g"
            "#,
        )
        .unwrap();

        assert_eq!(config.raft.peer_id, "host1:8001");
        assert_eq!(config.raft.election_timeout_ms, 5000);
        assert!(config.raft.use_snapshot);
        assert_eq!(config.raft.forward_timeout_ms, 3000);
        assert_eq!(config.raft.snapshot_interval_secs, 3600);
        assert_eq!(config.rpc.addr, "127.0.0.1:8090");
        assert_eq!(config.stores.len(), 1);
        assert_eq!(config.stores[0].store, "g");
    }

    #[test]
    fn test_relative_path_is_normalized() {
        let config = ServerConfig::from_toml_str(
            r#"
            [raft]
            path = "relative/raft"
            "#,
        )
        .unwrap();

        assert!(PathBuf::from(&config.raft.path).is_absolute());
        assert!(config.raft.path.ends_with("raft"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::from_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ServerConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_target_level() {
        let mut config = ServerConfig::default();
        config
            .logging
            .targets
            .insert("openraft".to_string(), "loud".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_peer_set_rejected() {
        let mut config = ServerConfig::default();
        config.raft.group_peers = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = ServerConfig::default();
        config.raft.election_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.raft.forward_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.raft.use_snapshot = true;
        config.raft.snapshot_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_rpc_addr() {
        let mut config = ServerConfig::default();
        config.rpc.addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_store_rejected() {
        let mut config = ServerConfig::default();
        config.stores.push(StoreSettings {
            database: "storenode".to_string(),
            store: "default".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config.apply_overrides(|key| match key {
            "STORENODE_PEER_ID" => Some("host2:8002".to_string()),
            "STORENODE_GROUP_PEERS" => Some("host1:8001,host2:8002".to_string()),
            _ => None,
        });

        assert_eq!(config.raft.peer_id, "host2:8002");
        assert_eq!(config.raft.group_peers, "host1:8001,host2:8002");
        assert_eq!(config.rpc.addr, "127.0.0.1:8090");
    }
}
