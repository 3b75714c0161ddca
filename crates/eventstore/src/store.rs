//! Event log contract.

use std::time::Instant;

use async_trait::async_trait;
use session_core::{AggregateIdentity, Error, Event, PendingEvent, Reducer, Result, SearchQuery};
use telemetry::metrics;
use tracing::{debug, warn};

/// Precondition of an append: no event of the target stream that matches
/// `query` may lie past `position`.
///
/// Events the writer's query does not select (kinds it cannot fold) never
/// invalidate its decision, so they do not cause conflicts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendCondition {
    pub query: SearchQuery,
    pub position: u64,
}

impl AppendCondition {
    pub fn new(query: SearchQuery, position: u64) -> Self {
        Self { query, position }
    }

    /// Condition over the whole stream.
    pub fn at(position: u64) -> Self {
        Self::new(SearchQuery::default(), position)
    }

    /// Condition on everything `model` has folded.
    pub fn of<R: Reducer>(model: &R) -> Self {
        Self::new(model.query(), model.base().processed_position)
    }

    /// Highest position among `stream` events the condition selects, 0 if none.
    pub fn observed_position<'a>(&self, stream: impl IntoIterator<Item = &'a Event>) -> u64 {
        stream
            .into_iter()
            .filter(|e| self.query.matches(e))
            .map(|e| e.position)
            .max()
            .unwrap_or(0)
    }

    pub fn holds<'a>(&self, stream: impl IntoIterator<Item = &'a Event>) -> Result<()> {
        let actual = self.observed_position(stream);
        if actual == self.position {
            Ok(())
        } else {
            Err(Error::conflict(self.position, actual))
        }
    }
}

/// Durable, ordered, append-only event log.
///
/// Implementations return events oldest first and assign positions per
/// aggregate starting at 1.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events matching `query`, ordered by append order.
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<Event>>;

    /// Appends `events` atomically if `condition` still holds for the
    /// aggregate's stream, else fails with [`Error::Conflict`]. Appending to a
    /// stream owned by another resource owner is a conflict as well.
    async fn push(
        &self,
        aggregate: &AggregateIdentity,
        condition: &AppendCondition,
        events: Vec<PendingEvent>,
    ) -> Result<Vec<Event>>;

    /// Latest position of the aggregate, 0 for an empty stream.
    async fn latest_position(&self, aggregate: &AggregateIdentity) -> Result<u64>;

    /// Check if the store is healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Queries the events selected by `model` and folds them into it.
///
/// A failed query is returned unchanged and leaves `model` untouched, as does
/// a malformed event.
pub async fn load<R>(store: &dyn EventStore, model: &mut R) -> Result<()>
where
    R: Reducer + Send,
{
    let query = model.query();
    let events = store.filter(&query).await.map_err(|e| {
        metrics().query_errors.inc();
        e
    })?;

    let count = events.len() as u64;
    let start = Instant::now();
    let result = model.load(events);
    metrics()
        .fold_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => {
            metrics().events_folded.inc_by(count);
            debug!(
                aggregate_id = %model.base().aggregate_id(),
                position = model.base().processed_position,
                events = count,
                "write model loaded"
            );
            Ok(())
        }
        Err(e) => {
            if matches!(e, Error::MalformedEvent { .. }) {
                metrics().malformed_events.inc();
            }
            warn!(aggregate_id = %model.base().aggregate_id(), error = %e, "failed to fold events");
            Err(e)
        }
    }
}
