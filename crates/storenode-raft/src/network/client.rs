//! Shared RPC client
//!
//! One client per process. Channels are created lazily per peer address and
//! cached, so every group talking to the same peer shares a connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tonic::transport::Channel;

use super::models::{StoreCommandRequest, StoreCommandResponse};
use super::service::raft_client::RaftClient;
use super::service::{RaftRpcRequest, RaftRpcResponse};
use crate::{PeerId, RaftError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability used by the leader forwarder to reach the leader
#[async_trait]
pub trait CommandClient: Send + Sync + 'static {
    /// Send `request` to `leader` and return its answer
    async fn store_command(
        &self,
        leader: &PeerId,
        request: StoreCommandRequest,
    ) -> Result<StoreCommandResponse, RaftError>;
}

#[derive(Debug, Clone, Default)]
pub struct RpcClient {
    /// Cached gRPC channels (peer address -> channel)
    channels: Arc<DashMap<String, Channel>>,
}

impl RpcClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached channel to `addr` (`host:port`), created lazily on first use
    pub fn channel(&self, addr: &str) -> Result<Channel, RaftError> {
        if let Some(channel) = self.channels.get(addr) {
            return Ok(channel.clone());
        }

        let channel = Channel::from_shared(format!("http://{}", addr))
            .map_err(|e| RaftError::Network(format!("Invalid peer address {}: {}", addr, e)))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .connect_lazy();

        // Racing creators: first insert wins, the other channel is dropped unused
        Ok(self.channels.entry(addr.to_string()).or_insert(channel).clone())
    }

    /// Drop the cached channel for `addr` so the next call reconnects
    pub fn evict(&self, addr: &str) {
        self.channels.remove(addr);
    }

    pub async fn raft_rpc(&self, addr: &str, request: RaftRpcRequest) -> Result<RaftRpcResponse, RaftError> {
        let mut client = RaftClient::new(self.channel(addr)?);
        let response = client
            .raft_rpc(tonic::Request::new(request))
            .await
            .map_err(|e| RaftError::Network(format!("Raft rpc to {} failed: {}", addr, e)))?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl CommandClient for RpcClient {
    async fn store_command(
        &self,
        leader: &PeerId,
        request: StoreCommandRequest,
    ) -> Result<StoreCommandResponse, RaftError> {
        let addr = leader.endpoint();
        let mut client = RaftClient::new(self.channel(&addr)?);
        let response = client
            .store_command(tonic::Request::new(request))
            .await
            .map_err(|e| RaftError::Network(format!("Store command rpc to {} failed: {}", addr, e)))?;
        Ok(response.into_inner())
    }
}
