//! Three-peer group over loopback RPC: followers forward to the leader.

mod common;

use std::sync::Arc;
use std::time::Duration;

use storenode_raft::{
    GroupId, MemoryStateMachine, RaftNode, StoreAction, StoreClosure, StoreCommand, StoreCommandRequest,
};

use common::{node_config, wait_until, TestHost};

const WAIT: Duration = Duration::from_secs(15);

// =============================================================================
// Test Cluster Infrastructure
// =============================================================================

struct TestPeer {
    host: TestHost,
    node: Arc<RaftNode>,
    sm: Arc<MemoryStateMachine>,
    _dir: tempfile::TempDir,
}

struct TestCluster {
    peers: Vec<TestPeer>,
}

impl TestCluster {
    async fn start(group: &GroupId) -> Self {
        let mut hosts = Vec::new();
        for _ in 0..3 {
            hosts.push(TestHost::start().await);
        }
        let group_peers = hosts.iter().map(TestHost::peer_id).collect::<Vec<_>>().join(",");

        let mut peers = Vec::new();
        for host in hosts {
            let dir = tempfile::tempdir().unwrap();
            let sm = Arc::new(MemoryStateMachine::new());
            let node = RaftNode::start(
                node_config(group, &host.peer_id(), &group_peers, dir.path()),
                sm.clone(),
                host.context.clone(),
            )
            .await
            .unwrap();
            peers.push(TestPeer {
                host,
                node,
                sm,
                _dir: dir,
            });
        }

        Self { peers }
    }

    /// Index of the peer every member agrees leads the group
    async fn wait_for_leader(&self) -> usize {
        let agreed = wait_until(WAIT, || {
            let leaders: Vec<_> = self.peers.iter().map(|p| p.node.current_leader()).collect();
            leaders[0].is_some() && leaders.iter().all(|l| *l == leaders[0])
        })
        .await;
        assert!(agreed, "peers never agreed on a leader");

        self.peers
            .iter()
            .position(|p| p.node.is_leader())
            .expect("leader present")
    }

    async fn shutdown(self) {
        for peer in self.peers {
            peer.node.shutdown().await;
            peer.host.server.shutdown().await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_follower_submit_is_applied_by_leader() {
    let group = GroupId::for_store("hugegraph", "g");
    let cluster = TestCluster::start(&group).await;
    let leader = cluster.wait_for_leader().await;
    let follower = (leader + 1) % cluster.peers.len();

    let (closure, done) = StoreClosure::channel();
    cluster.peers[follower]
        .node
        .submit(StoreCommand::new(StoreAction::Put, b"forwarded".to_vec()), closure)
        .await
        .unwrap();
    done.wait_timeout(WAIT).await.unwrap();

    // Applied on the leader before it answered the follower
    let expected = StoreCommand::new(StoreAction::Put, b"forwarded".to_vec());
    assert_eq!(cluster.peers[leader].sm.applied(), vec![expected.clone()]);

    // And replicated everywhere
    let replicated = wait_until(WAIT, || cluster.peers.iter().all(|p| p.sm.applied() == vec![expected.clone()])).await;
    assert!(replicated, "command did not reach every peer");

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submissions_from_every_peer_share_one_order() {
    let group = GroupId::for_store("hugegraph", "s");
    let cluster = TestCluster::start(&group).await;
    cluster.wait_for_leader().await;

    for (i, peer) in cluster.peers.iter().enumerate() {
        let (closure, done) = StoreClosure::channel();
        peer.node
            .submit(StoreCommand::new(StoreAction::IncrCounter, (i as i64 + 1).to_le_bytes().to_vec()), closure)
            .await
            .unwrap();
        done.wait_timeout(WAIT).await.unwrap();
    }

    let converged = wait_until(WAIT, || cluster.peers.iter().all(|p| p.sm.counter() == 6)).await;
    assert!(converged, "counters did not converge");

    let first = cluster.peers[0].sm.applied();
    assert_eq!(first.len(), 3);
    for peer in &cluster.peers[1..] {
        assert_eq!(peer.sm.applied(), first);
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_follower_refuses_forwarded_command() {
    let group = GroupId::for_store("hugegraph", "g");
    let cluster = TestCluster::start(&group).await;
    let leader = cluster.wait_for_leader().await;
    let follower = (leader + 1) % cluster.peers.len();

    let response = cluster.peers[follower]
        .host
        .context
        .handle_store_command(StoreCommandRequest {
            group_id: group.to_string(),
            action: StoreAction::Put.code() as u32,
            data: b"misrouted".to_vec(),
        })
        .await;

    assert!(!response.status);
    assert!(response.message.contains("not leader"));
    assert!(response.message.contains(&cluster.peers[leader].host.peer_id()));
    assert!(cluster.peers.iter().all(|p| p.sm.applied().is_empty()));

    cluster.shutdown().await;
}
