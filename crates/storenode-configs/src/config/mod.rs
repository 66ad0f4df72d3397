pub mod defaults;
mod loader;
mod types;

pub use types::{LoggingSettings, RaftSettings, RpcSettings, ServerConfig, StoreSettings};
