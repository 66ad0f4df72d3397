//! storenode-configs
//!
//! Server configuration types and loader for storenode.

pub mod config;

pub use config::*;
pub use config::defaults;
