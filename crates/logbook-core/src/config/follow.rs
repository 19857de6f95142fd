use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for follow workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowConfig {
    /// Upper bound of one wait cycle in milliseconds (default: 300)
    ///
    /// The worker checks for a stop request between wait cycles, so this
    /// also bounds how long a stop takes to be observed while idle.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Name given to the worker thread (default: "logbook-follow")
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_wait_timeout_ms() -> u64 {
    300
}

fn default_thread_name() -> String {
    "logbook-follow".to_string()
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl FollowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}
