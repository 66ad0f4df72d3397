//! State machine collaborator
//!
//! Committed log entries are decoded back into [`StoreCommand`](crate::StoreCommand)s
//! and handed to a [`StoreStateMachine`]. The backend store behind it is opaque
//! to this crate.

mod memory;
mod serde_helpers;
mod trait_def;

pub use memory::MemoryStateMachine;
pub use serde_helpers::{decode, encode};
pub use trait_def::{ApplyResult, StoreStateMachine};
