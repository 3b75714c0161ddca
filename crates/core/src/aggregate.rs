//! Aggregate identity.

use serde::{Deserialize, Serialize};

/// Aggregate type of every login session stream.
pub const SESSION_AGGREGATE_TYPE: &str = "session";

/// Identifies one event stream: `(type, id, owner)`.
///
/// The resource owner is optional on the read side: a caller that does not
/// know the owner yet must not filter by an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateIdentity {
    pub aggregate_type: String,
    pub id: String,
    pub resource_owner: Option<String>,
}

impl AggregateIdentity {
    pub fn new(
        aggregate_type: impl Into<String>,
        id: impl Into<String>,
        resource_owner: Option<String>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id: id.into(),
            resource_owner,
        }
    }

    /// Identity of a session aggregate.
    pub fn session(id: impl Into<String>, resource_owner: Option<String>) -> Self {
        Self::new(SESSION_AGGREGATE_TYPE, id, resource_owner)
    }

    /// Owner as a filter value; empty strings count as unknown.
    pub fn owner(&self) -> Option<&str> {
        self.resource_owner.as_deref().filter(|o| !o.is_empty())
    }

    /// Key used by stores to address the stream.
    pub fn stream_key(&self) -> (String, String) {
        (self.aggregate_type.clone(), self.id.clone())
    }
}
