//! Wire messages of the shared RPC service

mod forward;

pub use forward::{StoreCommandRequest, StoreCommandResponse};
