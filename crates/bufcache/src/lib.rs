//! # bufcache
//!
//! Client for an array buffer cache that lives in a separate worker context.
//!
//! The worker keeps the bytes; this side picks buffer ids, moves buffers and
//! ports across the channel, and turns replies back into values:
//!
//! - `store(buffer)` moves a buffer into the cache and returns its id
//! - `clone(id)` / `slice(id, begin, end)` copy bytes back out
//! - `purge(id)` evicts a buffer
//! - `connect(port)` / `disconnect(port)` share the cache with another endpoint

pub mod cache;
pub mod config;
pub mod loader;
pub mod protocol;
pub mod resources;

pub use cache::ArrayBufferCache;
pub use cache::Error;
pub use cache::Result;
pub use config::Config;
pub use config::FailedStorePolicy;
pub use loader::load;
pub use loader::load_with_config;
pub use protocol::BufferId;
pub use protocol::CacheResult;
pub use protocol::Call;
pub use protocol::ClientPort;
pub use protocol::WorkerPort;
pub use protocol::channel;
pub use resources::ResourceIds;
