//! # Cache protocol
//!
//! The vocabulary spoken between an `ArrayBufferCache` and its worker.
//!
//! | method       | params                              | result            |
//! |--------------|-------------------------------------|-------------------|
//! | `store`      | `arrayBuffer` (moved), `arrayBufferId` | none           |
//! | `clone`      | `arrayBufferId`                     | `arrayBuffer`     |
//! | `slice`      | `arrayBufferId`, `begin`, `end?`    | `arrayBuffer`     |
//! | `purge`      | `arrayBufferId`                     | none              |
//! | `connect`    | `port` (moved)                      | none              |
//! | `disconnect` | `port` (moved)                      | none              |
//!
//! `connect` hands over the worker end of a fresh channel; `disconnect` hands
//! over the client end of a connected channel, matched by `ChannelId`.

use portrpc::Operation;
use portrpc::Port;
use portrpc::Request;
use portrpc::Response;

/// Client-chosen identifier of a cached buffer.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "buffer-{}", self.0)
    }
}

/// A request to the cache worker. The variant is the method, its fields the params.
#[derive(Debug)]
pub enum Call {
    Store {
        array_buffer: Vec<u8>,
        array_buffer_id: BufferId,
    },
    Clone {
        array_buffer_id: BufferId,
    },
    /// Bytes in `[begin, end)`; `end: None` reads to the end. Bounds are
    /// interpreted by the worker.
    Slice {
        array_buffer_id: BufferId,
        begin: i64,
        end: Option<i64>,
    },
    Purge {
        array_buffer_id: BufferId,
    },
    /// Serve `port` as an additional client channel.
    Connect {
        port: WorkerPort,
    },
    /// Stop serving the channel `port` belongs to. The worker receives the
    /// client end of that channel, so nobody is left holding it.
    Disconnect {
        port: ClientPort,
    },
}

impl Operation for Call {
    fn name(&self) -> &'static str {
        match self {
            Call::Store { .. } => "store",
            Call::Clone { .. } => "clone",
            Call::Slice { .. } => "slice",
            Call::Purge { .. } => "purge",
            Call::Connect { .. } => "connect",
            Call::Disconnect { .. } => "disconnect",
        }
    }

    fn transferables(&self) -> &'static [&'static str] {
        match self {
            Call::Store { .. } => &["arrayBuffer"],
            Call::Connect { .. } | Call::Disconnect { .. } => &["port"],
            _ => &[],
        }
    }
}

/// Payload of a successful `clone` or `slice`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResult {
    pub array_buffer: Vec<u8>,
}

/// The endpoint a client holds: sends requests, receives responses.
pub type ClientPort = Port<Request<Call>, Response<CacheResult>>;

/// The endpoint a worker serves: receives requests, sends responses.
pub type WorkerPort = Port<Response<CacheResult>, Request<Call>>;

/// Creates a connected client/worker endpoint pair.
pub fn channel() -> (ClientPort, WorkerPort) {
    portrpc::channel()
}
