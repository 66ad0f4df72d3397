//! openraft-backed engine

use std::collections::BTreeMap;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use openraft::error::{ClientWriteError, Fatal, InitializeError};
use openraft::raft::ClientWriteResponse;
use openraft::storage::Adaptor;
use openraft::{Config, Raft, RaftMetrics, ServerState, SnapshotPolicy};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Span;

use super::{RaftEngine, Task};
use crate::manager::RaftOptions;
use crate::network::GroupNetworkFactory;
use crate::storage::{PeerNode, RaftStore, StoreAdaptor, StoreTypeConfig};
use crate::{Configuration, GroupId, PeerId, RaftError, StoreClosure};

/// Type alias for the openraft Raft instance
pub type RaftInstance = Raft<StoreTypeConfig>;

type WriteResult = Result<
    ClientWriteResponse<StoreTypeConfig>,
    openraft::error::RaftError<u64, ClientWriteError<u64, PeerNode>>,
>;

/// [`RaftEngine`] running one openraft instance
///
/// Entries handed to [`RaftEngine::apply`] go through an unbounded queue that
/// a single loop drains, so they reach openraft in submission order.
pub struct OpenRaftEngine {
    group: GroupId,
    peer_id: PeerId,
    node_id: u64,
    conf: Configuration,
    raft: RaftInstance,
    queue: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    apply_loop: Mutex<Option<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    span: Span,
}

impl OpenRaftEngine {
    /// Create the openraft instance for `peer_id` and start its apply loop
    ///
    /// The group is not bootstrapped yet; call [`OpenRaftEngine::initialize`]
    /// once the instance can receive RPCs.
    pub async fn start(
        group: GroupId,
        peer_id: PeerId,
        conf: Configuration,
        options: &RaftOptions,
        store: Arc<RaftStore>,
        network: GroupNetworkFactory,
        span: Span,
    ) -> Result<Self, RaftError> {
        let node_id = conf.node_id(&peer_id).ok_or_else(|| {
            RaftError::Config(format!("Peer {} is not part of initial configuration {}", peer_id, conf))
        })?;

        let config = Config {
            cluster_name: group.to_string(),
            election_timeout_min: options.election_timeout_min_ms(),
            election_timeout_max: options.election_timeout_max_ms(),
            heartbeat_interval: options.heartbeat_interval_ms(),
            max_payload_entries: options.replication_buffer_size,
            // Snapshots are driven by the interval ticker below
            snapshot_policy: SnapshotPolicy::Never,
            ..Default::default()
        };
        let config = Arc::new(config.validate().map_err(|e| RaftError::Config(e.to_string()))?);

        let (log_store, state_machine): (StoreAdaptor, StoreAdaptor) = Adaptor::new(store);

        let raft = Raft::new(node_id, config, network, log_store, state_machine)
            .await
            .map_err(|e| RaftError::Initialization(format!("Failed to create raft instance: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let apply_loop = tokio::spawn(run_apply_loop(
            raft.clone(),
            rx,
            group.clone(),
            conf.clone(),
            span.clone(),
        ));

        let mut background = Vec::new();
        if options.use_snapshot {
            background.push(tokio::spawn(run_snapshot_ticker(
                raft.clone(),
                options.snapshot_interval,
                span.clone(),
            )));
        }
        if options.enable_metrics {
            background.push(tokio::spawn(watch_role_changes(raft.clone(), conf.clone(), span.clone())));
        }

        tracing::info!(parent: &span, node_id, "Started raft engine");

        Ok(Self {
            group,
            peer_id,
            node_id,
            conf,
            raft,
            queue: Mutex::new(Some(tx)),
            apply_loop: Mutex::new(Some(apply_loop)),
            background: Mutex::new(background),
            span,
        })
    }

    /// Bootstrap the group with the initial peer set.
    ///
    /// A group that already has state (restart, or another peer got there
    /// first) is left as is.
    pub async fn initialize(&self) -> Result<(), RaftError> {
        let members: BTreeMap<u64, PeerNode> = self
            .conf
            .members()
            .map(|(id, peer)| (id, PeerNode::new(peer.endpoint())))
            .collect();

        match self.raft.initialize(members).await {
            Ok(()) => {
                tracing::info!(parent: &self.span, conf = %self.conf, "Initialized raft group");
                Ok(())
            }
            Err(openraft::error::RaftError::APIError(InitializeError::NotAllowed(_))) => {
                tracing::debug!(parent: &self.span, "Raft group already initialized");
                Ok(())
            }
            Err(e) => Err(RaftError::Initialization(format!(
                "Failed to initialize group {}: {}",
                self.group, e
            ))),
        }
    }

    pub fn raft(&self) -> &RaftInstance {
        &self.raft
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn metrics(&self) -> RaftMetrics<u64, PeerNode> {
        self.raft.metrics().borrow().clone()
    }

    /// Take a snapshot now instead of waiting for the ticker
    pub async fn trigger_snapshot(&self) -> Result<(), RaftError> {
        self.raft
            .trigger()
            .snapshot()
            .await
            .map_err(|e| RaftError::Internal(format!("Failed to trigger snapshot: {}", e)))
    }
}

#[async_trait]
impl RaftEngine for OpenRaftEngine {
    fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    fn is_leader(&self) -> bool {
        self.raft.metrics().borrow().current_leader == Some(self.node_id)
    }

    fn current_leader(&self) -> Option<PeerId> {
        let leader = self.raft.metrics().borrow().current_leader;
        leader.and_then(|id| self.conf.peer(id).cloned())
    }

    fn apply(&self, task: Task) {
        let rejected = match self.queue.lock().as_ref() {
            Some(tx) => tx.send(task).err().map(|e| e.0),
            None => Some(task),
        };
        if let Some(task) = rejected {
            task.done.fail(RaftError::Shutdown);
        }
    }

    async fn shutdown(&self) {
        // Closing the queue lets the apply loop drain and exit
        self.queue.lock().take();

        for handle in self.background.lock().drain(..) {
            handle.abort();
        }

        if let Err(e) = self.raft.shutdown().await {
            tracing::warn!(parent: &self.span, error = %e, "Raft shutdown reported an error");
        }

        let apply_loop = self.apply_loop.lock().take();
        if let Some(handle) = apply_loop {
            let _ = handle.await;
        }

        tracing::info!(parent: &self.span, "Raft engine stopped");
    }
}

async fn run_apply_loop(
    raft: RaftInstance,
    mut rx: mpsc::UnboundedReceiver<Task>,
    group: GroupId,
    conf: Configuration,
    span: Span,
) {
    while let Some(Task { data, done }) = rx.recv().await {
        let raft = raft.clone();
        let mut write = Box::pin(async move { raft.client_write(data).await });

        // The first poll hands the entry to the raft core, which fixes its
        // position in the log before the next task is taken.
        match futures::poll!(write.as_mut()) {
            Poll::Ready(result) => complete_write(result, done, &group, &conf),
            Poll::Pending => {
                let group = group.clone();
                let conf = conf.clone();
                tokio::spawn(async move {
                    let result = write.await;
                    complete_write(result, done, &group, &conf);
                });
            }
        }
    }

    tracing::debug!(parent: &span, "Apply loop finished");
}

fn complete_write(result: WriteResult, done: StoreClosure, group: &GroupId, conf: &Configuration) {
    match result {
        Ok(response) => match response.data.into_outcome() {
            Ok(data) => done.complete(data),
            Err(e) => done.fail(e),
        },
        Err(openraft::error::RaftError::APIError(ClientWriteError::ForwardToLeader(forward))) => {
            let leader = forward
                .leader_id
                .and_then(|id| conf.peer(id))
                .map(ToString::to_string);
            done.fail(RaftError::not_leader(group.as_str(), leader));
        }
        Err(openraft::error::RaftError::Fatal(Fatal::Stopped)) => done.fail(RaftError::Shutdown),
        Err(e) => done.fail(RaftError::apply_failed(e.to_string())),
    }
}

async fn run_snapshot_ticker(raft: RaftInstance, interval: Duration, span: Span) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = raft.trigger().snapshot().await {
            tracing::warn!(parent: &span, error = %e, "Failed to trigger snapshot");
            return;
        }
    }
}

async fn watch_role_changes(raft: RaftInstance, conf: Configuration, span: Span) {
    let mut metrics = raft.metrics();
    let mut last: Option<(ServerState, Option<u64>)> = None;

    loop {
        let (state, leader, term) = {
            let m = metrics.borrow_and_update();
            (m.state, m.current_leader, m.current_term)
        };

        if last != Some((state, leader)) {
            let leader_peer = leader
                .and_then(|id| conf.peer(id))
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string());
            tracing::info!(parent: &span, ?state, leader = %leader_peer, term, "Raft role changed");
            last = Some((state, leader));
        }

        if metrics.changed().await.is_err() {
            return;
        }
    }
}
