//! Broker configuration.

use std::time::Duration;

/// Settings for a `Broker`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Used in log events to tell brokers apart.
    pub name: String,
    /// Deadline for a single call. `None` waits for the response indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Config {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            call_timeout: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("broker")
    }
}
