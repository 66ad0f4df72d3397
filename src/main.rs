// storenode server entrypoint
//!
//! Initialization and graceful shutdown live in `lifecycle` so this file
//! remains a thin orchestrator.

mod lifecycle;
mod logging;

use anyhow::Result;
use lifecycle::{bootstrap, run};
use std::env;
use storenode_configs::ServerConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // First argument overrides the config location
    let config_path = env::args().nth(1).unwrap_or_else(|| "server.toml".to_string());

    let mut config = match ServerConfig::from_file(&config_path) {
        Ok(cfg) => {
            eprintln!(
                "Loaded config from: {}",
                std::fs::canonicalize(&config_path)
                    .unwrap_or_else(|_| std::path::PathBuf::from(&config_path))
                    .display()
            );
            cfg
        }
        Err(e) => {
            eprintln!("FATAL: Failed to load {}: {}", config_path, e);
            eprintln!("Server cannot start without valid configuration");
            std::process::exit(1);
        }
    };
    config.apply_env_overrides();
    config.finalize()?;

    // Logging before any other side effects
    logging::init_logging(&config.logging.level, Some(&config.logging.targets), &config.logging.format)?;

    info!("storenode v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Peer: {}  Group peers: {}  Raft path: {}",
        config.raft.peer_id, config.raft.group_peers, config.raft.path
    );

    let components = bootstrap(&config).await?;

    run(components).await
}
