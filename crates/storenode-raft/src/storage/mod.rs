//! Raft Storage Layer
//!
//! - [`StorageLayout`]: per-group log, meta and snapshot directories
//! - [`RaftStore`]: combined openraft storage (log + state machine) persisted
//!   under the layout
//! - [`StoreTypeConfig`]: openraft type configuration

mod files;
mod layout;
mod raft_store;
mod types;

pub use layout::StorageLayout;
pub use raft_store::{RaftStore, StoreAdaptor};
pub use types::{PeerNode, StoreTypeConfig};
