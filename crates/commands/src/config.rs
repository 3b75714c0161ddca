//! Command layer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for the load-decide-append cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Extra attempts after an append conflict
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between attempts in milliseconds, multiplied by the attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    10
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl CommandConfig {
    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}
