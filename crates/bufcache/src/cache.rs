//! # Array buffer cache client
//!
//! `ArrayBufferCache` is the typed face of a cache worker. Each method builds one
//! `Call`, sends it through the broker and shapes the reply. Nothing is
//! validated locally: unknown ids and bad bounds are the worker's to reject.

use std::sync::Arc;

use portrpc::Broker;
use portrpc::Request;
use portrpc::Response;
use portrpc::Transport;
use portrpc::broker;

use crate::config::Config;
use crate::config::FailedStorePolicy;
use crate::protocol::BufferId;
use crate::protocol::CacheResult;
use crate::protocol::Call;
use crate::protocol::ClientPort;
use crate::protocol::WorkerPort;
use crate::resources::ResourceIds;

#[derive(Debug, Clone)]
pub enum Error {
    Broker(broker::Error),
    /// A `clone` or `slice` reply arrived without its buffer.
    MissingResult { method: &'static str },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Broker(e) => write!(f, "{}", e),
            Self::MissingResult { method } => write!(f, "{} reply carried no result", method),
        }
    }
}

impl std::error::Error for Error {}

impl From<broker::Error> for Error {
    fn from(e: broker::Error) -> Self {
        Self::Broker(e)
    }
}

impl Error {
    /// The remote message, if the worker rejected the call.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Broker(broker::Error::Remote(e)) => Some(&e.message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for a worker-hosted array buffer cache.
///
/// Owns the call broker and the buffer-id registry; both live as long as the
/// cache and go away with it.
pub struct ArrayBufferCache {
    broker: Broker<Call, CacheResult>,
    buffer_ids: ResourceIds,
    failed_store: FailedStorePolicy,
}

impl ArrayBufferCache {
    /// Wraps the client end of a worker channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wrap(port: ClientPort) -> Self {
        Self::with_config(port, Config::default())
    }

    pub fn with_config(port: ClientPort, config: Config) -> Self {
        Self::from_transport(port, config)
    }

    /// Wraps any transport that speaks the cache protocol.
    pub fn from_transport(
        transport: impl Transport<Request<Call>, Response<CacheResult>>,
        config: Config,
    ) -> Self {
        Self::from_arc(Arc::new(transport), config)
    }

    pub fn from_arc(
        transport: Arc<dyn Transport<Request<Call>, Response<CacheResult>>>,
        config: Config,
    ) -> Self {
        Self {
            broker: Broker::from_arc(transport, config.broker),
            buffer_ids: ResourceIds::new(),
            failed_store: config.failed_store,
        }
    }

    /// Moves `array_buffer` into the cache and returns the id it is stored under.
    ///
    /// The buffer is handed over, not copied:
    ///
    /// ```compile_fail
    /// # async fn demo(cache: &bufcache::ArrayBufferCache) {
    /// let bytes = vec![0u8; 256];
    /// cache.store(bytes).await.unwrap();
    /// println!("{}", bytes.len());
    /// # }
    /// ```
    pub async fn store(&self, array_buffer: Vec<u8>) -> Result<BufferId> {
        let array_buffer_id = self.buffer_ids.allocate();
        let call = Call::Store {
            array_buffer,
            array_buffer_id,
        };

        match self.broker.invoke(call).await {
            Ok(_) => Ok(array_buffer_id),
            Err(e) => {
                // only a rejection proves the worker holds nothing under the id
                let rejected = matches!(e, broker::Error::Remote(_));
                if rejected && self.failed_store == FailedStorePolicy::Release {
                    self.buffer_ids.release(array_buffer_id);
                }
                tracing::debug!(
                    cache = self.broker.name(),
                    id = %array_buffer_id,
                    policy = ?self.failed_store,
                    error = %e,
                    "store failed"
                );
                Err(e.into())
            }
        }
    }

    /// Returns a copy of the cached buffer.
    ///
    /// Through an `Arc<ArrayBufferCache>`, `arc.clone(id)` resolves to
    /// `Arc::clone`; call `(*arc).clone(id)` instead.
    pub async fn clone(&self, array_buffer_id: BufferId) -> Result<Vec<u8>> {
        let result = self.broker.invoke(Call::Clone { array_buffer_id }).await?;
        Self::buffer("clone", result)
    }

    /// Returns the bytes in `[begin, end)` of the cached buffer, or from `begin`
    /// to the end when `end` is `None`.
    pub async fn slice(&self, array_buffer_id: BufferId, begin: i64, end: Option<i64>) -> Result<Vec<u8>> {
        let call = Call::Slice {
            array_buffer_id,
            begin,
            end,
        };
        let result = self.broker.invoke(call).await?;
        Self::buffer("slice", result)
    }

    /// Evicts a buffer. Its id is released only once the worker confirms.
    pub async fn purge(&self, array_buffer_id: BufferId) -> Result<()> {
        self.broker.invoke(Call::Purge { array_buffer_id }).await?;
        self.buffer_ids.release(array_buffer_id);
        Ok(())
    }

    /// Hands the worker another endpoint to serve from the same cache.
    pub async fn connect(&self, port: WorkerPort) -> Result<()> {
        self.broker.invoke(Call::Connect { port }).await?;
        Ok(())
    }

    /// Asks the worker to stop serving the channel `port` belongs to.
    ///
    /// `port` is the client end of a channel previously passed to `connect`.
    pub async fn disconnect(&self, port: ClientPort) -> Result<()> {
        self.broker.invoke(Call::Disconnect { port }).await?;
        Ok(())
    }

    /// Buffer ids currently reserved by this client.
    pub fn buffer_ids(&self) -> &ResourceIds {
        &self.buffer_ids
    }

    /// Number of calls still waiting for the worker.
    pub fn pending_calls(&self) -> usize {
        self.broker.pending_calls()
    }

    pub fn name(&self) -> &str {
        self.broker.name()
    }

    fn buffer(method: &'static str, result: Option<CacheResult>) -> Result<Vec<u8>> {
        result
            .map(|r| r.array_buffer)
            .ok_or(Error::MissingResult { method })
    }
}
