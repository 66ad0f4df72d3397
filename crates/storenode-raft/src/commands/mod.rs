//! Store commands and their log entry encoding
//!
//! A [`StoreCommand`] is an action tag plus an opaque payload owned by the
//! caller. On the leader path the payload is gzip-compressed before it is
//! handed to the engine; the action byte is never compressed.

mod compression;
mod store;

pub use compression::{compress, decompress};
pub use store::{StoreAction, StoreCommand};
