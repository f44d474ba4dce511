//! # Message ports
//!
//! In-process channel endpoints built on tokio mpsc channels.
//!
//! `channel()` creates two connected endpoints: what one sends, the other
//! receives. An endpoint is not `Clone`; handing it to someone else (including
//! sending it inside a message) moves it.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Transport;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Shared identity of the two endpoints of one channel.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

/// One end of a duplex channel. Sends `Out`, receives `In`.
pub struct Port<Out, In> {
    channel: ChannelId,
    tx: mpsc::UnboundedSender<Out>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<In>>>,
}

/// Creates a pair of connected endpoints.
///
/// Messages sent on the first are received by the second and vice versa.
pub fn channel<A, B>() -> (Port<A, B>, Port<B, A>) {
    let channel = ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();

    let a = Port {
        channel,
        tx: tx_a,
        rx: Arc::new(Mutex::new(rx_b)),
    };

    let b = Port {
        channel,
        tx: tx_b,
        rx: Arc::new(Mutex::new(rx_a)),
    };

    (a, b)
}

impl<Out, In> Port<Out, In> {
    /// The channel this endpoint belongs to. Both ends report the same id.
    pub fn channel_id(&self) -> ChannelId {
        self.channel
    }

    /// Whether the other end has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<Out, In> std::fmt::Debug for Port<Out, In> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port").field("channel", &self.channel).finish()
    }
}

#[async_trait::async_trait]
impl<Out, In> Transport<Out, In> for Port<Out, In>
where
    Out: Send + 'static,
    In: Send + 'static,
{
    async fn send(&self, message: Out) -> transport::Result<()> {
        self.tx
            .send(message)
            .map_err(|_| transport::Error::ConnectionLost(format!("{} closed", self.channel)))
    }

    async fn recv(&self) -> transport::Result<Option<In>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}
