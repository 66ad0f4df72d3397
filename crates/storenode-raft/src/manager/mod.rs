//! Raft Node Management
//!
//! - [`RaftNode`]: one replication group on this peer; owns the submit protocol
//! - [`LeaderForwarder`]: ships commands from a follower to the current leader
//! - [`RaftOptions`] / [`NodeConfig`]: runtime startup configuration

mod config;
mod forwarder;
mod raft_node;

pub use config::{NodeConfig, RaftOptions, DEFAULT_FORWARD_TIMEOUT_MS};
pub use forwarder::LeaderForwarder;
pub use raft_node::RaftNode;
