//! Core aggregate and domain event traits.

use std::fmt::Debug;

use common::AggregateId;
use event_store::{Tag, Version};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are facts that already happened, named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Debug + Send + Sync + Clone {
    /// Returns the event type name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced aggregates.
///
/// An aggregate is rebuilt by replaying its stream, decides which new events a
/// command produces, and applies events without side effects.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, or None before its first event.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the current version of the aggregate.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate. Must be pure and infallible.
    fn apply(&mut self, event: Self::Event);

    /// Index tags written with every event of this aggregate.
    ///
    /// Computed from the state after the new events are applied, so a stream's
    /// first event already carries the references it introduces.
    fn tags(&self) -> Vec<Tag> {
        Vec::new()
    }

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
