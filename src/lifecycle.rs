//! Server lifecycle management helpers.
//!
//! Brings up the shared RPC listener and one replication group per
//! configured store, then coordinates graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use storenode_configs::ServerConfig;
use storenode_raft::{
    start_rpc_server, GroupId, MemoryStateMachine, NodeConfig, RaftNode, RpcContext, RpcServerHandle,
};
use tracing::{error, info};

/// Everything that must be stopped on shutdown
pub struct ApplicationComponents {
    pub context: Arc<RpcContext>,
    pub server: RpcServerHandle,
    pub nodes: Vec<Arc<RaftNode>>,
}

/// Start the RPC server, then every store's replication group.
pub async fn bootstrap(config: &ServerConfig) -> Result<ApplicationComponents> {
    let addr: SocketAddr = config
        .rpc
        .addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid rpc.addr '{}': {}", config.rpc.addr, e))?;

    let context = Arc::new(RpcContext::new(tracing::info_span!("storenode")));

    let phase_start = std::time::Instant::now();
    let server = start_rpc_server(addr, context.clone(), config.raft.rpc_thread_pool_size).await?;
    info!(
        "RPC server listening on {} ({:.2}ms)",
        server.local_addr(),
        phase_start.elapsed().as_secs_f64() * 1000.0
    );

    let mut nodes = Vec::with_capacity(config.stores.len());
    for store in &config.stores {
        let group = GroupId::for_store(&store.database, &store.store);
        let node_config = NodeConfig::from_settings(group.clone(), &config.raft);

        let phase_start = std::time::Instant::now();
        match RaftNode::start(node_config, Arc::new(MemoryStateMachine::new()), context.clone()).await {
            Ok(node) => {
                info!(
                    "Replication group {} started ({:.2}ms)",
                    group,
                    phase_start.elapsed().as_secs_f64() * 1000.0
                );
                nodes.push(node);
            }
            Err(e) => {
                error!("Failed to start replication group {}: {}", group, e);
                let started = ApplicationComponents { context, server, nodes };
                shutdown(started).await;
                return Err(e.into());
            }
        }
    }

    Ok(ApplicationComponents { context, server, nodes })
}

/// Serve until Ctrl+C, then stop every group and the listener.
pub async fn run(components: ApplicationComponents) -> Result<()> {
    info!(
        "storenode ready: {} group(s) on {}",
        components.context.groups().len(),
        components.server.local_addr()
    );

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, initiating graceful shutdown...");

    shutdown(components).await;
    Ok(())
}

async fn shutdown(components: ApplicationComponents) {
    for node in &components.nodes {
        node.shutdown().await;
    }
    components.server.shutdown().await;
    info!("Shutdown complete");
}
