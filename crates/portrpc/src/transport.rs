//! # Transport Abstraction
//!
//! A minimal, async interface for moving messages between two execution contexts.
//!
//! ## Philosophy
//!
//! - **One-Way**: A transport sends a message and, separately, yields whatever
//!   arrives from the other side. It knows nothing about calls, ids or replies;
//!   correlation is built on top of this, not defined here.
//! - **Move, don't copy**: `send` takes the message by value. Whatever the message
//!   owns (buffers, ports) belongs to the receiver from then on.

use std::fmt;

/// Errors that occur at the channel layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The other side is gone or the channel was dropped.
    ConnectionLost(String),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A bidirectional message endpoint: sends `Out`, receives `In`.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport<Out, In>>`).
#[async_trait::async_trait]
pub trait Transport<Out, In>: Send + Sync + 'static {
    /// Hands `message` to the channel.
    ///
    /// # invariants
    /// - Must return `Err` if the other side can no longer receive.
    /// - Must not inspect or clone the message.
    async fn send(&self, message: Out) -> Result<()>;

    /// Waits for the next inbound message.
    ///
    /// Returns `Ok(None)` once the other side has hung up and the stream is drained.
    async fn recv(&self) -> Result<Option<In>>;
}
