//! Raft Node
//!
//! One replication group as seen from this peer. Owns the submit protocol:
//! the leader appends commands to its own log, a follower forwards them to
//! the leader.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::Span;

use super::config::NodeConfig;
use super::forwarder::LeaderForwarder;
use crate::engine::{OpenRaftEngine, RaftEngine, Task};
use crate::network::{CommandClient, GroupNetworkFactory, RpcContext};
use crate::state_machine::StoreStateMachine;
use crate::storage::{RaftStore, StorageLayout};
use crate::{Configuration, GroupId, PeerId, RaftError, StoreClosure, StoreCommand};

pub struct RaftNode {
    group: GroupId,
    engine: Arc<dyn RaftEngine>,
    forwarder: LeaderForwarder,
    /// Set when the node was registered by [`RaftNode::start`]
    context: Option<Weak<RpcContext>>,
    span: Span,
}

impl std::fmt::Debug for RaftNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaftNode")
            .field("group", &self.group)
            .field("peer_id", self.engine.peer_id())
            .finish_non_exhaustive()
    }
}

impl RaftNode {
    /// Assemble a node from an already running engine
    pub fn new(
        group: GroupId,
        engine: Arc<dyn RaftEngine>,
        client: Arc<dyn CommandClient>,
        forward_timeout: Duration,
        span: Span,
    ) -> Self {
        let forwarder = LeaderForwarder::new(
            group.clone(),
            engine.clone(),
            client,
            forward_timeout,
            span.clone(),
        );
        Self {
            group,
            engine,
            forwarder,
            context: None,
            span,
        }
    }

    /// Bring up the replication group described by `config`.
    ///
    /// Identity and peer set are validated before anything touches the
    /// filesystem. The returned node is registered with `context`, so the
    /// shared RPC server routes engine traffic and forwarded commands to it.
    pub async fn start(
        config: NodeConfig,
        state_machine: Arc<dyn StoreStateMachine>,
        context: Arc<RpcContext>,
    ) -> Result<Arc<Self>, RaftError> {
        let span = tracing::info_span!(
            parent: context.span(),
            "raft_node",
            group = %config.group,
            peer = %config.peer_id
        );

        let peer_id: PeerId = config.peer_id.parse()?;
        let conf: Configuration = config.group_peers.parse()?;
        if !conf.contains(&peer_id) {
            return Err(RaftError::Config(format!(
                "Peer {} is not part of initial configuration {}",
                peer_id, conf
            )));
        }

        let options = &config.options;
        let layout = StorageLayout::new(&config.raft_path, &config.group, options.use_snapshot);
        layout.create_dirs()?;

        let store = RaftStore::open(config.group.clone(), &layout, state_machine, span.clone())
            .await
            .map_err(|e| RaftError::Initialization(format!("Failed to open raft store: {}", e)))?;

        let network = GroupNetworkFactory::new(config.group.clone(), context.client().clone(), span.clone());
        let engine = OpenRaftEngine::start(
            config.group.clone(),
            peer_id,
            conf,
            options,
            Arc::new(store),
            network,
            span.clone(),
        )
        .await?;

        // Register before bootstrapping so vote requests from peers can be routed
        context.register_raft(config.group.clone(), engine.raft().clone());
        if let Err(e) = engine.initialize().await {
            context.unregister(&config.group);
            engine.shutdown().await;
            return Err(e);
        }

        let client: Arc<dyn CommandClient> = Arc::new(context.client().clone());
        let mut node = RaftNode::new(
            config.group.clone(),
            Arc::new(engine),
            client,
            options.forward_timeout,
            span,
        );
        node.context = Some(Arc::downgrade(&context));

        let node = Arc::new(node);
        context.register_node(node.clone());

        tracing::info!(parent: &node.span, path = %config.raft_path.display(), "Raft node started");
        Ok(node)
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn peer_id(&self) -> &PeerId {
        self.engine.peer_id()
    }

    pub fn is_leader(&self) -> bool {
        self.engine.is_leader()
    }

    pub fn current_leader(&self) -> Option<PeerId> {
        self.engine.current_leader()
    }

    /// Submit a state-changing command.
    ///
    /// On the leader the command is appended to the log and `closure` fires
    /// once it is applied. On a follower the uncompressed command is forwarded
    /// to the leader and `closure` reflects the leader's answer.
    ///
    /// Only a failed forward (transport error, timeout, unknown leader) is
    /// returned as an error; it is also delivered to `closure`.
    pub async fn submit(&self, command: StoreCommand, closure: StoreClosure) -> Result<(), RaftError> {
        if self.engine.is_leader() {
            self.apply_locally(command, closure);
            return Ok(());
        }
        self.forwarder.forward(command, closure).await
    }

    /// Append `command` to the local log. Never blocks.
    pub fn apply_locally(&self, command: StoreCommand, closure: StoreClosure) {
        match command.to_entry() {
            Ok(entry) => {
                tracing::trace!(parent: &self.span, action = %command.action(), bytes = entry.len(), "Applying command");
                self.engine.apply(Task::new(entry, closure));
            }
            Err(e) => closure.fail(e),
        }
    }

    /// Stop routing to this node and stop its engine
    pub async fn shutdown(&self) {
        if let Some(context) = self.context.as_ref().and_then(Weak::upgrade) {
            context.unregister(&self.group);
        }
        self.engine.shutdown().await;
        tracing::info!(parent: &self.span, "Raft node stopped");
    }
}
