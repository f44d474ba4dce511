//! Cache client configuration.

use std::time::Duration;

/// What happens to a buffer id when the worker rejects the `store` that used it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailedStorePolicy {
    /// Keep the id reserved. The worker may or may not hold something under it.
    #[default]
    Retain,
    /// Return the id to the pool when the worker answers with an error.
    ///
    /// Timeouts, channel loss and dropped `store` futures keep the id
    /// reserved as under `Retain`, since the worker may still store the buffer.
    Release,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker: portrpc::Config,
    pub failed_store: FailedStorePolicy,
}

impl Config {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.broker = self.broker.with_name(name);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.broker = self.broker.with_call_timeout(timeout);
        self
    }

    pub fn with_failed_store(mut self, policy: FailedStorePolicy) -> Self {
        self.failed_store = policy;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: portrpc::Config::new("array-buffer-cache"),
            failed_store: FailedStorePolicy::default(),
        }
    }
}
