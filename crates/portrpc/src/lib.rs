//! # portrpc
//!
//! Request/response correlation over a one-way message channel.
//!
//! A worker context answers named operations; the client sends a request
//! envelope `{ id, call }` and gets back exactly one response envelope
//! `{ id, error, result }`. The `Broker` matches the two by id, so any number of
//! calls can share one channel without cross-talk.
//!
//! ```text
//! invoke ─► allocate id ─► register ─► send ───► worker
//!                                                  │
//! caller ◄─ resolve ◄─ deregister ◄─ pump ◄────────┘
//! ```

pub mod broker;
pub mod config;
pub mod envelope;
pub mod ids;
pub mod port;
pub mod transport;

pub use broker::Broker;
pub use config::Config;
pub use envelope::Operation;
pub use envelope::RemoteError;
pub use envelope::Request;
pub use envelope::Response;
pub use ids::CallId;
pub use port::ChannelId;
pub use port::Port;
pub use port::channel;
pub use transport::Transport;
