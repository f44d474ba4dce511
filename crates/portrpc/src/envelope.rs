//! # Envelopes
//!
//! The two message shapes that cross a channel:
//!
//! - `Request { id, call }`: the call carries the method name and its params.
//! - `Response { id, error, result }`: exactly one per request, either an error
//!   or an (optional) result, never both.

use crate::ids::CallId;

/// A named remote operation together with its parameters.
///
/// Implemented by the enum that describes a worker API, one variant per method.
pub trait Operation: Send + 'static {
    /// The wire name of the method.
    fn name(&self) -> &'static str;

    /// Names of the params whose ownership moves with the message.
    fn transferables(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Outbound call envelope.
#[derive(Debug)]
pub struct Request<C> {
    pub id: CallId,
    pub call: C,
}

impl<C: Operation> Request<C> {
    pub fn new(id: CallId, call: C) -> Self {
        Self { id, call }
    }

    pub fn method(&self) -> &'static str {
        self.call.name()
    }
}

/// The error half of a response, as reported by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Inbound reply envelope.
#[derive(Debug)]
pub struct Response<R> {
    pub id: CallId,
    error: Option<RemoteError>,
    result: Option<R>,
}

impl<R> Response<R> {
    /// A successful reply. `result` is `None` for methods without a payload.
    pub fn success(id: CallId, result: Option<R>) -> Self {
        Self {
            id,
            error: None,
            result,
        }
    }

    /// A failed reply carrying the remote message.
    pub fn failure(id: CallId, message: impl Into<String>) -> Self {
        Self {
            id,
            error: Some(RemoteError::new(message)),
            result: None,
        }
    }

    pub fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    pub fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    /// Splits the envelope into its outcome.
    pub fn into_outcome(self) -> Result<Option<R>, RemoteError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}
