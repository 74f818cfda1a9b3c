use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Tag, Version};

/// Precondition that no further events carrying `tag` exist.
///
/// The writer counts the tagged events when it makes its decision and the
/// append only commits if that count is unchanged. Events are never removed,
/// so an equal count means nothing referencing the tag was written in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGuard {
    pub tag: Tag,
    pub expected_events: u64,
}

impl TagGuard {
    pub fn new(tag: Tag, expected_events: u64) -> Self {
        Self {
            tag,
            expected_events,
        }
    }
}

/// Options for appending events to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the stream for optimistic concurrency control.
    /// If None, no version check is performed.
    pub expected_version: Option<Version>,

    /// Optional tag guard checked in the same commit.
    pub guard: Option<TagGuard>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stream to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
            guard: None,
        }
    }

    /// Creates options expecting the stream to not exist yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }

    /// Adds a tag guard to these options.
    pub fn with_guard(mut self, guard: TagGuard) -> Self {
        self.guard = Some(guard);
        self
    }
}

/// Events destined for one stream, with the preconditions for writing them.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl AppendRequest {
    pub fn new(events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self { events, options }
    }

    /// Returns the stream this request writes to.
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        self.events.first().map(|e| e.aggregate_id)
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to one or more streams in a single atomic commit.
    ///
    /// Either every request is written or none is. Each request's expected
    /// version and tag guard are checked inside the commit; the first failing
    /// precondition aborts the whole batch with `ConcurrencyConflict` or
    /// `GuardViolated`.
    ///
    /// Returns the new version of each stream, in request order.
    async fn append_batch(&self, requests: Vec<AppendRequest>) -> Result<Vec<Version>>;

    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let mut versions = self
            .append_batch(vec![AppendRequest::new(events, options)])
            .await?;
        versions
            .pop()
            .ok_or_else(|| EventStoreError::InvalidAppend("empty batch result".to_string()))
    }

    /// Retrieves all events for a stream, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events matching a query, in commit order.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Counts the events carrying `tag`.
    async fn count_tagged(&self, tag: &Tag) -> Result<u64>;

    /// Streams all events in the store, in commit order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Gets the current version of a stream, or None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to the store.
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    /// Checks if a stream exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads the full stream of every aggregate that has at least one event
    /// matching `query`, ordered by the first matching event.
    async fn load_matching_streams(
        &self,
        query: EventQuery,
    ) -> Result<Vec<(AggregateId, Vec<EventEnvelope>)>> {
        let matching = self.query_events(query).await?;

        let mut seen = HashSet::new();
        let mut streams = Vec::new();
        for event in matching {
            if seen.insert(event.aggregate_id) {
                let events = self.get_events_for_aggregate(event.aggregate_id).await?;
                streams.push((event.aggregate_id, events));
            }
        }
        Ok(streams)
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Lets a store chosen at runtime (`Arc<dyn EventStore>`) be shared by every
/// service that is generic over its store.
#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn append_batch(&self, requests: Vec<AppendRequest>) -> Result<Vec<Version>> {
        (**self).append_batch(requests).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        (**self).get_events_for_aggregate(aggregate_id).await
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        (**self).query_events(query).await
    }

    async fn count_tagged(&self, tag: &Tag) -> Result<u64> {
        (**self).count_tagged(tag).await
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        (**self).stream_all_events().await
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        (**self).get_aggregate_version(aggregate_id).await
    }
}

/// Validates a batch before any of it is written.
pub fn validate_batch(requests: &[AppendRequest]) -> Result<()> {
    if requests.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    }

    let mut streams = HashSet::new();
    for request in requests {
        validate_events_for_append(&request.events)?;
        let first = &request.events[0];
        if !streams.insert(first.aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "aggregate {} appears twice in one batch",
                first.aggregate_id
            )));
        }
        if let Some(expected) = request.options.expected_version
            && first.version != expected.next()
        {
            return Err(EventStoreError::InvalidAppend(format!(
                "first event version {} does not follow expected version {}",
                first.version, expected
            )));
        }
    }
    Ok(())
}

/// Validates the events of a single stream append.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "all events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events must have the same aggregate type".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type("Test")
            .aggregate_id(aggregate_id)
            .aggregate_type("Test")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_batch(&[]),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn gapped_versions_are_rejected() {
        let id = AggregateId::new();
        let result = validate_events_for_append(&[event(id, 1), event(id, 3)]);
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[test]
    fn same_stream_twice_in_batch_is_rejected() {
        let id = AggregateId::new();
        let requests = vec![
            AppendRequest::new(vec![event(id, 1)], AppendOptions::new()),
            AppendRequest::new(vec![event(id, 2)], AppendOptions::new()),
        ];
        assert!(matches!(
            validate_batch(&requests),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn first_version_must_follow_expected() {
        let id = AggregateId::new();
        let requests = vec![AppendRequest::new(
            vec![event(id, 3)],
            AppendOptions::expect_version(Version::first()),
        )];
        assert!(validate_batch(&requests).is_err());
    }
}
