//! Raft Network Layer
//!
//! One gRPC listener per process serves every replication group; requests
//! carry the group id and are routed through the [`RpcContext`].
//!
//! ## Components
//!
//! - [`GroupNetwork`] / [`GroupNetworkFactory`]: openraft network for one group
//! - [`RpcClient`]: shared client with cached channels; also the
//!   [`CommandClient`] used to forward commands to a leader
//! - [`RaftService`] / [`start_rpc_server`]: the shared gRPC server
//! - [`RpcContext`]: group registry the server routes through

mod client;
mod context;
pub mod models;
mod network;
mod service;

pub use client::{CommandClient, RpcClient};
pub use context::RpcContext;
pub use models::{StoreCommandRequest, StoreCommandResponse};
pub use network::{GroupNetwork, GroupNetworkFactory};
pub use service::{
    raft_client, raft_server, start_rpc_server, RaftRpcRequest, RaftRpcResponse, RaftService,
    RpcServerHandle,
};
