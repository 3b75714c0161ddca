//! In-memory event log.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use session_core::{AggregateIdentity, Error, Event, PendingEvent, Result, SearchQuery};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::store::{AppendCondition, EventStore};

#[derive(Debug, Default)]
struct Log {
    /// Every event in append order
    events: Vec<Event>,
    /// `(type, id)` -> (latest position, owner)
    streams: HashMap<(String, String), (u64, String)>,
}

/// Event store keeping the whole log in memory.
///
/// Appends take a single write lock, so the position check and the append
/// happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from an exported log. Events are kept in the given
    /// order; per-aggregate positions must be strictly increasing.
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Result<Self> {
        let mut log = Log::default();
        for event in events {
            let key = (event.aggregate_type.clone(), event.aggregate_id.clone());
            let entry = log
                .streams
                .entry(key)
                .or_insert_with(|| (0, event.resource_owner.clone()));
            if event.position <= entry.0 {
                return Err(Error::validation(format!(
                    "event {} of {} at position {} follows position {}",
                    event.kind, event.aggregate_id, event.position, entry.0
                )));
            }
            entry.0 = event.position;
            log.events.push(event);
        }
        Ok(Self {
            log: RwLock::new(log),
        })
    }

    /// Total number of stored events.
    pub fn len(&self) -> usize {
        self.log.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct `(type, id)` pairs in first-append order.
    pub fn aggregates(&self) -> Vec<(String, String)> {
        let log = self.log.read();
        let mut seen = Vec::new();
        for event in &log.events {
            let key = (event.aggregate_type.clone(), event.aggregate_id.clone());
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        seen
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<Event>> {
        let log = self.log.read();
        let matching = log.events.iter().filter(|e| query.matches(e)).cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn push(
        &self,
        aggregate: &AggregateIdentity,
        condition: &AppendCondition,
        events: Vec<PendingEvent>,
    ) -> Result<Vec<Event>> {
        let mut log = self.log.write();
        let (latest, owner) = log
            .streams
            .get(&aggregate.stream_key())
            .cloned()
            .unwrap_or_else(|| (0, aggregate.owner().unwrap_or_default().to_string()));

        if latest > 0 && !owner.is_empty() && aggregate.owner().is_some_and(|o| o != owner) {
            metrics().append_conflicts.inc();
            warn!(
                aggregate_id = %aggregate.id,
                owner = %owner,
                "append rejected, stream belongs to another owner"
            );
            return Err(Error::conflict(condition.position, latest));
        }

        let stream = log.events.iter().filter(|e| {
            e.aggregate_type == aggregate.aggregate_type && e.aggregate_id == aggregate.id
        });
        if let Err(e) = condition.holds(stream) {
            metrics().append_conflicts.inc();
            warn!(aggregate_id = %aggregate.id, error = %e, "append rejected, aggregate moved on");
            return Err(e);
        }

        let now = Utc::now();
        let mut position = latest;
        let appended: Vec<Event> = events
            .into_iter()
            .map(|pending| {
                position += 1;
                Event {
                    aggregate_type: aggregate.aggregate_type.clone(),
                    aggregate_id: aggregate.id.clone(),
                    resource_owner: owner.clone(),
                    kind: pending.kind,
                    data: pending.data,
                    position,
                    created_at: now,
                    creator: pending.creator,
                }
            })
            .collect();

        log.streams.insert(aggregate.stream_key(), (position, owner));
        log.events.extend(appended.iter().cloned());
        metrics().events_appended.inc_by(appended.len() as u64);
        debug!(aggregate_id = %aggregate.id, position, count = appended.len(), "events appended");

        Ok(appended)
    }

    async fn latest_position(&self, aggregate: &AggregateIdentity) -> Result<u64> {
        Ok(self
            .log
            .read()
            .streams
            .get(&aggregate.stream_key())
            .map(|(position, _)| *position)
            .unwrap_or(0))
    }
}
