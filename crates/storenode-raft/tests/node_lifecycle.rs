//! Single-peer replication group lifecycle: start, submit, restart, shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use storenode_raft::{
    GroupId, MemoryStateMachine, RaftError, RaftNode, StoreAction, StoreClosure, StoreCommand, StoreStateMachine,
};

use common::{node_config, wait_until, TestHost};

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_single_node_becomes_leader_and_applies() {
    let dir = tempfile::tempdir().unwrap();
    let host = TestHost::start().await;
    let group = GroupId::for_store("hugegraph", "g");
    let peer = host.peer_id();

    let sm = Arc::new(MemoryStateMachine::new());
    let node = RaftNode::start(
        node_config(&group, &peer, &peer, dir.path()),
        sm.clone(),
        host.context.clone(),
    )
    .await
    .unwrap();

    assert!(dir.path().join("log").join("hugegraph-g").is_dir());
    assert!(dir.path().join("meta").join("hugegraph-g").is_dir());
    assert!(!dir.path().join("snapshot").exists());
    assert_eq!(host.context.groups(), vec![group.clone()]);

    assert!(wait_until(WAIT, || node.is_leader()).await, "single peer never became leader");
    assert_eq!(node.current_leader().map(|p| p.to_string()), Some(peer.clone()));

    let (closure, done) = StoreClosure::channel();
    node.submit(StoreCommand::new(StoreAction::Put, b"k1=v1".to_vec()), closure)
        .await
        .unwrap();
    done.wait_timeout(WAIT).await.unwrap();

    let incr = StoreCommand::new(StoreAction::IncrCounter, 4i64.to_le_bytes().to_vec());
    let (closure, done) = StoreClosure::channel();
    node.submit(incr, closure).await.unwrap();
    assert_eq!(done.wait_timeout(WAIT).await.unwrap(), 4i64.to_le_bytes().to_vec());

    let applied = sm.applied();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0], StoreCommand::new(StoreAction::Put, b"k1=v1".to_vec()));
    assert_eq!(sm.counter(), 4);

    node.shutdown().await;
    assert!(host.context.groups().is_empty());
    host.server.shutdown().await;
}

#[tokio::test]
async fn test_state_machine_error_reaches_closure() {
    let dir = tempfile::tempdir().unwrap();
    let host = TestHost::start().await;
    let group = GroupId::for_store("hugegraph", "g");
    let peer = host.peer_id();

    let node = RaftNode::start(
        node_config(&group, &peer, &peer, dir.path()),
        Arc::new(MemoryStateMachine::new()),
        host.context.clone(),
    )
    .await
    .unwrap();
    assert!(wait_until(WAIT, || node.is_leader()).await);

    // Counter deltas must be 8 bytes
    let (closure, done) = StoreClosure::channel();
    node.submit(StoreCommand::new(StoreAction::IncrCounter, vec![1, 2]), closure)
        .await
        .unwrap();
    assert!(matches!(done.wait_timeout(WAIT).await, Err(RaftError::ApplyFailed(_))));

    node.shutdown().await;
    host.server.shutdown().await;
}

#[tokio::test]
async fn test_restart_reapplies_committed_log() {
    let dir = tempfile::tempdir().unwrap();
    let host = TestHost::start().await;
    let group = GroupId::for_store("hugegraph", "s");
    let peer = host.peer_id();

    let node = RaftNode::start(
        node_config(&group, &peer, &peer, dir.path()),
        Arc::new(MemoryStateMachine::new()),
        host.context.clone(),
    )
    .await
    .unwrap();
    assert!(wait_until(WAIT, || node.is_leader()).await);

    for key in ["a", "b", "c"] {
        let (closure, done) = StoreClosure::channel();
        node.submit(StoreCommand::new(StoreAction::Put, key.as_bytes().to_vec()), closure)
            .await
            .unwrap();
        done.wait_timeout(WAIT).await.unwrap();
    }
    node.shutdown().await;

    // Same directories, fresh state machine
    let sm = Arc::new(MemoryStateMachine::new());
    let restarted = RaftNode::start(
        node_config(&group, &peer, &peer, dir.path()),
        sm.clone(),
        host.context.clone(),
    )
    .await
    .unwrap();

    assert!(wait_until(WAIT, || sm.applied().len() == 3).await, "committed entries were not re-applied");
    let keys: Vec<Vec<u8>> = sm.applied().into_iter().map(StoreCommand::into_data).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    assert!(wait_until(WAIT, || restarted.is_leader()).await);
    restarted.shutdown().await;
    host.server.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_dir_created_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let host = TestHost::start().await;
    let group = GroupId::for_store("hugegraph", "g");
    let peer = host.peer_id();

    let mut config = node_config(&group, &peer, &peer, dir.path());
    config.options.use_snapshot = true;

    let node = RaftNode::start(config, Arc::new(MemoryStateMachine::new()), host.context.clone())
        .await
        .unwrap();
    assert!(dir.path().join("snapshot").join("hugegraph-g").is_dir());

    node.shutdown().await;
    host.server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("raft");
    let host = TestHost::start().await;
    let group = GroupId::for_store("hugegraph", "g");
    let sm: Arc<dyn StoreStateMachine> = Arc::new(MemoryStateMachine::new());

    // Malformed peer id
    let err = RaftNode::start(
        node_config(&group, "not-a-peer", "127.0.0.1:9001", &root),
        sm.clone(),
        host.context.clone(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RaftError::Config(_)));

    // Malformed peer list
    let err = RaftNode::start(
        node_config(&group, "127.0.0.1:9001", "127.0.0.1:9001,bogus", &root),
        sm.clone(),
        host.context.clone(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RaftError::Config(_)));

    // Peer outside the initial configuration
    let err = RaftNode::start(
        node_config(&group, "127.0.0.1:9009", "127.0.0.1:9001,127.0.0.1:9002", &root),
        sm,
        host.context.clone(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RaftError::Config(_)));

    assert!(!root.exists());
    assert!(host.context.groups().is_empty());
    host.server.shutdown().await;
}

#[tokio::test]
async fn test_unwritable_path_is_initialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let host = TestHost::start().await;
    let group = GroupId::for_store("hugegraph", "g");
    let peer = host.peer_id();

    let err = RaftNode::start(
        node_config(&group, &peer, &peer, &blocker),
        Arc::new(MemoryStateMachine::new()),
        host.context.clone(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RaftError::Initialization(_)));
    host.server.shutdown().await;
}
