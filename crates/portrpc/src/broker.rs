//! # Broker with dispatch pump
//!
//! This module provides the `Broker`, which turns a one-way message channel into
//! awaitable calls. It spawns a pump task that demultiplexes incoming responses
//! and hands each one to the pending call with the same identifier.
//!
//! ## Lifecycle of a call
//!
//! 1. A call id is drawn and the pending entry is inserted in one step.
//! 2. The request envelope is sent; its payload moves with it.
//! 3. The pump receives the response, removes the entry, then resolves it.
//!
//! An entry leaves the registry exactly once: on response, on send failure, on
//! timeout, when the caller drops the call, or when the channel is lost.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::envelope::Operation;
use crate::envelope::RemoteError;
use crate::envelope::Request;
use crate::envelope::Response;
use crate::ids;
use crate::ids::CallId;
use crate::transport;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum Error {
    /// The remote side answered with an error.
    Remote(RemoteError),
    Transport(transport::Error),
    /// The channel closed while the call was pending.
    Disconnected,
    /// No response arrived within the configured deadline.
    Timeout { id: CallId, method: &'static str },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(e) => write!(f, "{}", e),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Disconnected => write!(f, "Channel closed before a response arrived"),
            Self::Timeout { id, method } => write!(f, "{} ({}) timed out", method, id),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Self::Remote(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

type Outcome<R> = Result<Option<R>>;

/// The continuation of a call awaiting its response.
struct PendingCall<R> {
    method: &'static str,
    tx: oneshot::Sender<Outcome<R>>,
}

type Pending<R> = DashMap<CallId, PendingCall<R>>;

/// Client side of a request/response protocol over a `Transport`.
///
/// Sends `Request<C>` envelopes and correlates `Response<R>` envelopes back to
/// the calls that produced them. Any number of calls may be in flight at once;
/// they complete in whatever order the responses arrive.
///
/// Dropping the broker stops its pump.
pub struct Broker<C, R> {
    config: Config,
    transport: Arc<dyn Transport<Request<C>, Response<R>>>,
    pending: Arc<Pending<R>>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl<C, R> Broker<C, R>
where
    C: Operation,
    R: Send + 'static,
{
    /// Wraps `transport` with the default configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(transport: impl Transport<Request<C>, Response<R>>) -> Self {
        Self::with_config(transport, Config::default())
    }

    pub fn with_config(transport: impl Transport<Request<C>, Response<R>>, config: Config) -> Self {
        Self::from_arc(Arc::new(transport), config)
    }

    /// Wraps a shared transport and spawns the pump task.
    pub fn from_arc(transport: Arc<dyn Transport<Request<C>, Response<R>>>, config: Config) -> Self {
        let pending = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        let pump = tokio::spawn(Self::pump(
            config.name.clone(),
            transport.clone(),
            pending.clone(),
            closed.clone(),
        ));

        Self {
            config,
            transport,
            pending,
            closed,
            pump,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: CallId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Whether the pump has stopped because the channel closed or failed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends `call` and waits for the matching response.
    ///
    /// Resolves to the response's result, `None` for methods that carry no
    /// payload back. Remote failures come back as `Error::Remote` holding the
    /// remote message verbatim.
    ///
    /// Dropping the returned future before it settles deregisters the call.
    pub async fn invoke(&self, call: C) -> Result<Option<R>> {
        let method = call.name();
        let transfers = call.transferables();

        let (tx, rx) = oneshot::channel();
        let id = self.register(method, tx);
        let mut ticket = Ticket {
            id,
            pending: &self.pending,
            rx: Some(rx),
        };

        // the pump sets this before draining the registry, so a call registered
        // after the drain is caught here
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Disconnected);
        }

        tracing::debug!(broker = %self.config.name, %id, method, ?transfers, "sending request");
        self.transport.send(Request::new(id, call)).await?;

        match self.config.call_timeout {
            None => ticket.wait().await,
            Some(limit) => match tokio::time::timeout(limit, ticket.wait()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(broker = %self.config.name, %id, method, ?limit, "call timed out");
                    Err(Error::Timeout { id, method })
                }
            },
        }
    }

    /// Draws a call id and inserts the pending entry under it.
    fn register(&self, method: &'static str, tx: oneshot::Sender<Outcome<R>>) -> CallId {
        let mut call = Some(PendingCall { method, tx });
        let id = ids::allocate(|candidate| match self.pending.entry(CallId(candidate)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                if let Some(call) = call.take() {
                    slot.insert(call);
                }
                true
            }
        });
        CallId(id)
    }

    async fn pump(
        name: String,
        transport: Arc<dyn Transport<Request<C>, Response<R>>>,
        pending: Arc<Pending<R>>,
        closed: Arc<AtomicBool>,
    ) {
        let error = loop {
            match transport.recv().await {
                Ok(Some(response)) => Self::dispatch(&name, &pending, response),
                Ok(None) => {
                    tracing::warn!(broker = %name, "channel closed");
                    break Error::Disconnected;
                }
                Err(e) => {
                    tracing::warn!(broker = %name, error = %e, "transport error in pump");
                    break Error::Transport(e);
                }
            }
        };

        closed.store(true, Ordering::SeqCst);
        Self::reject_all(&name, &pending, error);
    }

    /// Hands a response to the call it belongs to.
    fn dispatch(name: &str, pending: &Pending<R>, response: Response<R>) {
        let id = response.id;

        // deregister before resolving
        let Some((_, call)) = pending.remove(&id) else {
            tracing::warn!(broker = %name, %id, "ignoring response for unknown call");
            return;
        };

        let failed = response.error().is_some();
        tracing::debug!(broker = %name, %id, method = call.method, failed, "dispatching response");

        let outcome = response.into_outcome().map_err(Error::Remote);
        if call.tx.send(outcome).is_err() {
            tracing::debug!(broker = %name, %id, "caller dropped before its response arrived");
        }
    }

    /// Rejects every pending call with `error`.
    fn reject_all(name: &str, pending: &Pending<R>, error: Error) {
        let keys: Vec<CallId> = pending.iter().map(|e| *e.key()).collect();
        if !keys.is_empty() {
            tracing::warn!(broker = %name, count = keys.len(), %error, "rejecting pending calls");
        }
        for key in keys {
            if let Some((_, call)) = pending.remove(&key) {
                let _ = call.tx.send(Err(error.clone()));
            }
        }
    }
}

impl<C, R> Drop for Broker<C, R> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// The caller's claim on a pending call.
///
/// Removes the registry entry if the call is dropped before it settles.
struct Ticket<'a, R> {
    id: CallId,
    pending: &'a Pending<R>,
    rx: Option<oneshot::Receiver<Outcome<R>>>,
}

impl<R> Ticket<'_, R> {
    async fn wait(&mut self) -> Outcome<R> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(Error::Disconnected);
        };
        let outcome = rx.await.unwrap_or(Err(Error::Disconnected));
        self.rx = None;
        outcome
    }
}

impl<R> Drop for Ticket<'_, R> {
    fn drop(&mut self) {
        let Some(rx) = self.rx.take() else {
            return;
        };
        drop(rx);

        // the id may already have been handed to a newer call; only an entry
        // whose receiver is gone is ours
        let removed = self
            .pending
            .remove_if(&self.id, |_, call| call.tx.is_closed())
            .is_some();
        if removed {
            tracing::warn!(id = %self.id, "abandoned call deregistered");
        }
    }
}
