//! Raft Network Implementation
//!
//! openraft transport for one replication group. Every RPC is a `RaftRpc`
//! call on the shared service, tagged with the group id so the receiving
//! process can route it.

use openraft::error::{InstallSnapshotError, NetworkError, RPCError, RaftError, RemoteError};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::Span;

use super::client::RpcClient;
use super::service::RaftRpcRequest;
use crate::state_machine::{decode, encode};
use crate::storage::{PeerNode, StoreTypeConfig};
use crate::GroupId;

/// Network implementation for a single Raft group and target peer
pub struct GroupNetwork {
    target: u64,
    target_addr: String,
    group: GroupId,
    client: RpcClient,
    span: Span,
}

impl GroupNetwork {
    pub fn new(target: u64, target_node: &PeerNode, group: GroupId, client: RpcClient, span: Span) -> Self {
        Self {
            target,
            target_addr: target_node.addr.clone(),
            group,
            client,
            span,
        }
    }

    /// Send one openraft request and decode the remote `Result`
    async fn send<Req, Resp, E>(
        &self,
        rpc_type: &str,
        rpc: &Req,
    ) -> Result<Resp, RPCError<u64, PeerNode, RaftError<u64, E>>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: std::error::Error + DeserializeOwned + 'static,
    {
        let payload = encode(rpc).map_err(|e| RPCError::Network(NetworkError::new(&e)))?;

        let request = RaftRpcRequest {
            group_id: self.group.to_string(),
            rpc_type: rpc_type.to_string(),
            payload,
        };

        let response = self
            .client
            .raft_rpc(&self.target_addr, request)
            .await
            .map_err(|e| {
                tracing::trace!(parent: &self.span, target = self.target, rpc_type, error = %e, "Raft rpc failed");
                RPCError::Network(NetworkError::new(&e))
            })?;

        if !response.error.is_empty() {
            let err = crate::RaftError::Network(format!(
                "{} to node {} rejected: {}",
                rpc_type, self.target, response.error
            ));
            return Err(RPCError::Network(NetworkError::new(&err)));
        }

        let result: Result<Resp, RaftError<u64, E>> =
            decode(&response.payload).map_err(|e| RPCError::Network(NetworkError::new(&e)))?;

        result.map_err(|e| RPCError::RemoteError(RemoteError::new(self.target, e)))
    }
}

impl RaftNetwork<StoreTypeConfig> for GroupNetwork {
    async fn append_entries(
        &mut self,
        rpc: AppendEntriesRequest<StoreTypeConfig>,
        _option: RPCOption,
    ) -> Result<AppendEntriesResponse<u64>, RPCError<u64, PeerNode, RaftError<u64>>> {
        self.send("append_entries", &rpc).await
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshotRequest<StoreTypeConfig>,
        _option: RPCOption,
    ) -> Result<InstallSnapshotResponse<u64>, RPCError<u64, PeerNode, RaftError<u64, InstallSnapshotError>>> {
        self.send("install_snapshot", &rpc).await
    }

    async fn vote(
        &mut self,
        rpc: VoteRequest<u64>,
        _option: RPCOption,
    ) -> Result<VoteResponse<u64>, RPCError<u64, PeerNode, RaftError<u64>>> {
        self.send("vote", &rpc).await
    }
}

/// Factory for creating network instances
#[derive(Clone)]
pub struct GroupNetworkFactory {
    group: GroupId,
    client: RpcClient,
    span: Span,
}

impl GroupNetworkFactory {
    pub fn new(group: GroupId, client: RpcClient, span: Span) -> Self {
        Self { group, client, span }
    }
}

impl RaftNetworkFactory<StoreTypeConfig> for GroupNetworkFactory {
    type Network = GroupNetwork;

    async fn new_client(&mut self, target: u64, node: &PeerNode) -> Self::Network {
        GroupNetwork::new(target, node, self.group.clone(), self.client.clone(), self.span.clone())
    }
}
