//! Shared helpers for tests that run real openraft groups over loopback RPC.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::Span;

use storenode_raft::{GroupId, NodeConfig, RaftOptions, RpcContext, RpcServerHandle, start_rpc_server};

/// One process worth of RPC plumbing: a context and its bound server
pub struct TestHost {
    pub context: Arc<RpcContext>,
    pub server: RpcServerHandle,
}

impl TestHost {
    /// Bind on an ephemeral loopback port
    pub async fn start() -> Self {
        let context = Arc::new(RpcContext::new(Span::none()));
        let server = start_rpc_server("127.0.0.1:0".parse().unwrap(), context.clone(), 16)
            .await
            .expect("bind rpc server");
        Self { context, server }
    }

    /// This host's peer id, `127.0.0.1:<port>`
    pub fn peer_id(&self) -> String {
        self.server.local_addr().to_string()
    }
}

/// Engine options tuned for fast elections on loopback
pub fn fast_options() -> RaftOptions {
    RaftOptions {
        election_timeout: Duration::from_millis(300),
        forward_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn node_config(group: &GroupId, peer_id: &str, group_peers: &str, raft_path: &Path) -> NodeConfig {
    NodeConfig {
        group: group.clone(),
        peer_id: peer_id.to_string(),
        group_peers: group_peers.to_string(),
        raft_path: raft_path.to_path_buf(),
        options: fast_options(),
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    condition()
}
