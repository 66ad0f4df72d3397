//! storenode Raft Layer
//!
//! Replicates state-changing store commands through one Raft group per
//! backend store. The consensus algorithm itself comes from openraft; this
//! crate owns the group's on-disk layout and startup, and the submit protocol
//! that decides whether a command is applied locally or forwarded to the
//! leader.
//!
//! ## Key Components
//!
//! - [`RaftNode`]: one replication group on this peer (`start`, `submit`)
//! - [`StoreCommand`] / [`StoreAction`]: what gets replicated
//! - [`StoreClosure`]: single-fire completion handle for a submitted command
//! - [`LeaderForwarder`]: follower-to-leader forwarding
//! - [`RpcContext`] / [`start_rpc_server`]: one shared RPC listener for all groups
//! - [`StoreStateMachine`]: where committed commands are applied
//!
//! ## Usage
//!
//! ```rust,ignore
//! let context = Arc::new(RpcContext::new(tracing::Span::current()));
//! let server = start_rpc_server(addr, context.clone(), options.rpc_thread_pool_size).await?;
//!
//! let node = RaftNode::start(config, Arc::new(MemoryStateMachine::new()), context).await?;
//!
//! let (closure, done) = StoreClosure::channel();
//! node.submit(StoreCommand::new(StoreAction::Put, payload), closure).await?;
//! done.wait().await?;
//! ```

pub mod closure;
pub mod commands;
pub mod engine;
pub mod error;
pub mod group_id;
pub mod manager;
pub mod network;
pub mod peer;
pub mod state_machine;
pub mod storage;

pub use closure::{CommandFuture, StoreClosure};
pub use commands::{StoreAction, StoreCommand};
pub use engine::{OpenRaftEngine, RaftEngine, RaftInstance, Task};
pub use error::{RaftError, Result};
pub use group_id::GroupId;
pub use manager::{LeaderForwarder, NodeConfig, RaftNode, RaftOptions, DEFAULT_FORWARD_TIMEOUT_MS};
pub use network::{
    start_rpc_server, CommandClient, RpcClient, RpcContext, RpcServerHandle, StoreCommandRequest,
    StoreCommandResponse,
};
pub use peer::{Configuration, PeerId};
pub use state_machine::{ApplyResult, MemoryStateMachine, StoreStateMachine};
pub use storage::{PeerNode, RaftStore, StorageLayout, StoreTypeConfig};
