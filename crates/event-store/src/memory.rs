use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Tag, Version,
    store::{AppendRequest, EventStore, EventStream, validate_batch},
};

/// In-memory event store used by tests and single-node deployments.
///
/// One write lock covers the whole batch, so every precondition is checked
/// against the same state the events are then written into.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

fn stream_version(store: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
    store
        .iter()
        .filter(|e| e.aggregate_id == aggregate_id)
        .map(|e| e.version)
        .max()
        .unwrap_or(Version::initial())
}

fn tagged_count(store: &[EventEnvelope], tag: &Tag) -> u64 {
    store.iter().filter(|e| e.has_tag(tag)).count() as u64
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_batch(&self, requests: Vec<AppendRequest>) -> Result<Vec<Version>> {
        validate_batch(&requests)?;

        let mut store = self.events.write().await;

        let mut versions = Vec::with_capacity(requests.len());
        for request in &requests {
            let first_event = &request.events[0];
            let aggregate_id = first_event.aggregate_id;
            let current_version = stream_version(&store, aggregate_id);

            if let Some(expected) = request.options.expected_version
                && current_version != expected
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual: current_version,
                });
            }

            // Unique (aggregate, version) constraint
            if first_event.version <= current_version {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: request.options.expected_version.unwrap_or(current_version),
                    actual: current_version,
                });
            }

            if let Some(ref guard) = request.options.guard {
                let actual = tagged_count(&store, &guard.tag);
                if actual != guard.expected_events {
                    return Err(EventStoreError::GuardViolated {
                        tag: guard.tag.clone(),
                        expected: guard.expected_events,
                        actual,
                    });
                }
            }

            versions.push(
                request
                    .events
                    .last()
                    .map(|e| e.version)
                    .unwrap_or(current_version),
            );
        }

        for request in requests {
            store.extend(request.events);
        }

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(store
            .iter()
            .filter(|e| query.matches(e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_tagged(&self, tag: &Tag) -> Result<u64> {
        let store = self.events.read().await;
        Ok(tagged_count(&store, tag))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.events.read().await.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        let version = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max();
        Ok(version)
    }
}
