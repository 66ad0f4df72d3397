//! Process-wide RPC context
//!
//! Holds every replication group hosted by this process so the shared RPC
//! server can route incoming requests by group id, plus the shared client
//! used for outgoing calls.

use std::sync::Arc;

use dashmap::DashMap;
use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use tracing::Span;

use super::client::RpcClient;
use super::models::{StoreCommandRequest, StoreCommandResponse};
use crate::engine::RaftInstance;
use crate::state_machine::{decode, encode};
use crate::storage::StoreTypeConfig;
use crate::{GroupId, RaftError, RaftNode, StoreAction, StoreClosure, StoreCommand};

pub struct RpcContext {
    /// openraft instances, for engine traffic
    rafts: DashMap<GroupId, RaftInstance>,
    /// Nodes, for forwarded commands
    nodes: DashMap<GroupId, Arc<RaftNode>>,
    client: RpcClient,
    span: Span,
}

impl std::fmt::Debug for RpcContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcContext")
            .field("groups", &self.groups())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl RpcContext {
    pub fn new(span: Span) -> Self {
        Self {
            rafts: DashMap::new(),
            nodes: DashMap::new(),
            client: RpcClient::new(),
            span,
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn register_raft(&self, group: GroupId, raft: RaftInstance) {
        self.rafts.insert(group, raft);
    }

    pub fn register_node(&self, node: Arc<RaftNode>) {
        self.nodes.insert(node.group().clone(), node);
    }

    /// Stop routing requests to `group`
    pub fn unregister(&self, group: &GroupId) {
        self.rafts.remove(group);
        self.nodes.remove(group);
    }

    pub fn node(&self, group: &GroupId) -> Option<Arc<RaftNode>> {
        self.nodes.get(group).map(|n| n.value().clone())
    }

    /// Groups with a registered node, sorted
    pub fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self.nodes.iter().map(|n| n.key().clone()).collect();
        groups.sort();
        groups
    }

    fn raft(&self, group: &str) -> Result<RaftInstance, RaftError> {
        self.rafts
            .get(&GroupId::from(group))
            .map(|r| r.value().clone())
            .ok_or_else(|| RaftError::GroupNotFound(group.to_string()))
    }

    pub async fn handle_vote(&self, group: &str, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        let raft = self.raft(group)?;
        let request: VoteRequest<u64> = decode(payload)?;
        encode(&raft.vote(request).await)
    }

    pub async fn handle_append_entries(&self, group: &str, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        let raft = self.raft(group)?;
        let request: AppendEntriesRequest<StoreTypeConfig> = decode(payload)?;
        encode(&raft.append_entries(request).await)
    }

    pub async fn handle_install_snapshot(&self, group: &str, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        let raft = self.raft(group)?;
        let request: InstallSnapshotRequest<StoreTypeConfig> = decode(payload)?;
        encode(&raft.install_snapshot(request).await)
    }

    /// Apply a command forwarded by a follower.
    ///
    /// Only the leader accepts it; anything else is answered with
    /// `status = false` and never forwarded again.
    pub async fn handle_store_command(&self, request: StoreCommandRequest) -> StoreCommandResponse {
        let group = GroupId::from(request.group_id);
        let Some(node) = self.node(&group) else {
            tracing::warn!(parent: &self.span, %group, "Forwarded command for unknown group");
            return StoreCommandResponse::rejected(RaftError::GroupNotFound(group.to_string()).to_string());
        };

        let action = match u8::try_from(request.action)
            .map_err(|_| RaftError::Serialization(format!("Unknown store action code: {}", request.action)))
            .and_then(StoreAction::from_code)
        {
            Ok(action) => action,
            Err(e) => return StoreCommandResponse::rejected(e.to_string()),
        };

        if !node.is_leader() {
            let leader = node
                .current_leader()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            tracing::debug!(parent: &self.span, %group, %leader, "Rejecting forwarded command, not leader");
            return StoreCommandResponse::rejected(format!("not leader, leader is {}", leader));
        }

        let (closure, done) = StoreClosure::channel();
        node.apply_locally(StoreCommand::new(action, request.data), closure);

        match done.wait().await {
            Ok(_) => StoreCommandResponse::ok(),
            Err(e) => StoreCommandResponse::rejected(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_group_is_rejected() {
        let context = RpcContext::new(Span::none());
        let response = context
            .handle_store_command(StoreCommandRequest {
                group_id: "db-missing".to_string(),
                action: StoreAction::Put.code() as u32,
                data: Vec::new(),
            })
            .await;

        assert!(!response.status);
        assert!(response.message.contains("db-missing"));
    }

    #[tokio::test]
    async fn test_engine_rpc_for_unknown_group() {
        let context = RpcContext::new(Span::none());
        let err = context.handle_vote("db-missing", &[]).await.unwrap_err();
        assert!(matches!(err, RaftError::GroupNotFound(_)));
        assert!(context.groups().is_empty());
    }
}
