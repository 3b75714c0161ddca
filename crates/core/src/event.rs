//! Stored events as returned by the event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable fact appended to one aggregate's stream.
///
/// `position` is assigned by the log and increases monotonically within the
/// aggregate, starting at 1. `created_at` is stamped at append time and is
/// advisory; replay order is decided by `position` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub resource_owner: String,
    /// Event kind discriminator, e.g. `session.password.checked`
    pub kind: String,
    /// Kind-specific payload
    #[serde(default)]
    pub data: serde_json::Value,
    pub position: u64,
    pub created_at: DateTime<Utc>,
    /// Who caused the event (user or service id)
    #[serde(default)]
    pub creator: String,
}

/// An event waiting to be appended. The log assigns position and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub creator: String,
}

impl PendingEvent {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            creator: String::new(),
        }
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }
}
