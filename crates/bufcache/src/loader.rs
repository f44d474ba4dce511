//! Starting a worker and wrapping it in one step.

use std::future::Future;

use crate::cache::ArrayBufferCache;
use crate::config::Config;
use crate::protocol;
use crate::protocol::WorkerPort;

/// Spawns `worker` on the current tokio runtime, serving a fresh channel, and
/// returns a cache client wired to the other end.
///
/// The worker owns its endpoint. It sees the stream end once the returned
/// cache (and anything it connected) is dropped.
pub fn load<F, Fut>(worker: F) -> ArrayBufferCache
where
    F: FnOnce(WorkerPort) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    load_with_config(worker, Config::default())
}

pub fn load_with_config<F, Fut>(worker: F, config: Config) -> ArrayBufferCache
where
    F: FnOnce(WorkerPort) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (client, server) = protocol::channel();
    tracing::debug!(cache = %config.broker.name, channel = %client.channel_id(), "spawning worker");
    tokio::spawn(worker(server));
    ArrayBufferCache::with_config(client, config)
}
