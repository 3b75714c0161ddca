//! Generic fold engine underneath every write model.
//!
//! A write model is built for one load-decide-append cycle: the caller queries
//! the log, hands the ordered events to [`Reducer::load`] and reads
//! [`WriteModel::processed_position`] as the expected position of its next
//! append. Nothing here performs I/O.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::aggregate::AggregateIdentity;
use crate::error::Result;
use crate::event::Event;
use crate::query::SearchQuery;

/// Shared state of a write model: identity, fold position and the buffer of
/// events waiting to be folded.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteModel {
    pub identity: AggregateIdentity,
    /// Highest position folded so far, 0 if none
    pub processed_position: u64,
    /// Creation time of the last folded event
    pub change_date: Option<DateTime<Utc>>,
    pending: Vec<Event>,
}

impl WriteModel {
    pub fn new(identity: AggregateIdentity) -> Self {
        Self {
            identity,
            processed_position: 0,
            change_date: None,
            pending: Vec::new(),
        }
    }

    pub fn aggregate_id(&self) -> &str {
        &self.identity.id
    }

    pub fn resource_owner(&self) -> Option<&str> {
        self.identity.owner()
    }

    /// Buffers events for the next reduce.
    pub fn append_events(&mut self, events: impl IntoIterator<Item = Event>) {
        self.pending.extend(events);
    }

    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    /// Events at or below the processed position were already folded.
    pub fn is_unprocessed(&self, event: &Event) -> bool {
        event.position > self.processed_position
    }

    /// Advances the position marker past `event`.
    pub fn mark_processed(&mut self, event: &Event) {
        self.processed_position = event.position;
        self.change_date = Some(event.created_at);
        if self.identity.owner().is_none() && !event.resource_owner.is_empty() {
            self.identity.resource_owner = Some(event.resource_owner.clone());
        }
    }
}

/// Domain reducer on top of [`WriteModel`].
///
/// `reduce` is transactional: events fold into a copy which replaces `self`
/// only when every buffered event applied cleanly.
pub trait Reducer: Clone {
    fn base(&self) -> &WriteModel;

    fn base_mut(&mut self) -> &mut WriteModel;

    /// Applies a single event. Kinds the reducer does not know are ignored.
    fn apply(&mut self, event: &Event) -> Result<()>;

    /// Query selecting the events this model folds.
    fn query(&self) -> SearchQuery;

    fn append_events(&mut self, events: impl IntoIterator<Item = Event>) {
        self.base_mut().append_events(events);
    }

    fn reduce(&mut self) -> Result<()> {
        let events = self.base_mut().take_pending();
        let mut next = self.clone();
        for event in &events {
            if !next.base().is_unprocessed(event) {
                trace!(
                    position = event.position,
                    processed = next.base().processed_position,
                    "skipping already folded event"
                );
                continue;
            }
            next.apply(event)?;
            next.base_mut().mark_processed(event);
        }
        *self = next;
        Ok(())
    }

    /// Buffers and folds `events` in one step.
    fn load(&mut self, events: impl IntoIterator<Item = Event>) -> Result<()> {
        self.append_events(events);
        self.reduce()
    }
}
