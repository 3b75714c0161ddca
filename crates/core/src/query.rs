//! Event selection contract shared by every store.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Filter over the event log. An empty list places no restriction on that
/// dimension; `resource_owner: None` means "no owner filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub aggregate_types: Vec<String>,
    pub aggregate_ids: Vec<String>,
    pub resource_owner: Option<String>,
    pub event_kinds: Vec<String>,
    /// Only events strictly after this position
    pub position_after: u64,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::default()
    }

    /// Whether `event` belongs to the result set, ignoring `limit`.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.aggregate_types.is_empty()
            && !self.aggregate_types.iter().any(|t| *t == event.aggregate_type)
        {
            return false;
        }
        if !self.aggregate_ids.is_empty()
            && !self.aggregate_ids.iter().any(|id| *id == event.aggregate_id)
        {
            return false;
        }
        if let Some(owner) = &self.resource_owner {
            if *owner != event.resource_owner {
                return false;
            }
        }
        if !self.event_kinds.is_empty() && !self.event_kinds.iter().any(|k| *k == event.kind) {
            return false;
        }
        event.position > self.position_after
    }
}

/// Builder for [`SearchQuery`].
#[derive(Debug, Default)]
pub struct SearchQueryBuilder {
    query: SearchQuery,
}

impl SearchQueryBuilder {
    pub fn aggregate_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query
            .aggregate_types
            .extend(types.into_iter().map(Into::into));
        self
    }

    pub fn aggregate_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query
            .aggregate_ids
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn event_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query
            .event_kinds
            .extend(kinds.into_iter().map(Into::into));
        self
    }

    /// Adds the tenancy filter only when an owner is known.
    pub fn resource_owner(mut self, owner: Option<&str>) -> Self {
        self.query.resource_owner = owner.filter(|o| !o.is_empty()).map(str::to_string);
        self
    }

    pub fn position_after(mut self, position: u64) -> Self {
        self.query.position_after = position;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn build(self) -> SearchQuery {
        self.query
    }
}
