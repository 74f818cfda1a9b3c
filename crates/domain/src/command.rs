//! Command handling infrastructure.

use std::collections::HashMap;
use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, AppendRequest, EventEnvelope, EventStore, TagGuard, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Events decided by a command but not yet written.
///
/// Several pending commits from different handlers can be written together
/// with [`EventStore::append_batch`], which is how checkout, quote acceptance
/// and completion keep their streams consistent with each other.
#[derive(Debug)]
pub struct PendingCommit<A: Aggregate> {
    result: CommandResult<A>,
    request: Option<AppendRequest>,
}

impl<A: Aggregate> PendingCommit<A> {
    /// Adds a tag guard to the append.
    pub fn with_guard(mut self, guard: TagGuard) -> Self {
        if let Some(request) = self.request.take() {
            let options = request.options.with_guard(guard);
            self.request = Some(AppendRequest::new(request.events, options));
        }
        self
    }

    /// The aggregate as it will be once the commit lands.
    pub fn aggregate(&self) -> &A {
        &self.result.aggregate
    }

    /// Splits into the append request (None if the command produced no
    /// events) and the result to hand back after a successful write.
    pub fn into_parts(self) -> (Option<AppendRequest>, CommandResult<A>) {
        (self.request, self.result)
    }
}

/// Handler for executing commands against aggregates.
///
/// Loads the aggregate from its stream, runs the command to produce events,
/// and appends them on the condition that the stream is still at the version
/// it was read at.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
    DomainError: From<A::Error>,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the stream is empty, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;
        Self::replay(events)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Rebuilds an aggregate from an already-fetched stream.
    pub fn replay(events: Vec<EventEnvelope>) -> Result<A, DomainError> {
        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }
        Ok(aggregate)
    }

    /// Rebuilds every aggregate present in `events`, which may interleave
    /// several streams. Aggregates come back in order of their first event.
    pub fn replay_streams(events: Vec<EventEnvelope>) -> Result<Vec<A>, DomainError> {
        let mut order = Vec::new();
        let mut streams: HashMap<AggregateId, Vec<EventEnvelope>> = HashMap::new();
        for event in events {
            let stream = streams.entry(event.aggregate_id).or_insert_with(|| {
                order.push(event.aggregate_id);
                Vec::new()
            });
            stream.push(event);
        }

        order
            .into_iter()
            .filter_map(|id| streams.remove(&id))
            .map(Self::replay)
            .collect()
    }

    /// Runs a command against the current state without writing anything.
    pub async fn prepare<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<PendingCommit<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        let events = command_fn(&aggregate)?;
        Self::stage(aggregate_id, aggregate, events)
    }

    /// Stages `events` on top of an aggregate the caller already loaded.
    pub fn stage(
        aggregate_id: AggregateId,
        mut aggregate: A,
        events: Vec<A::Event>,
    ) -> Result<PendingCommit<A>, DomainError> {
        let current_version = aggregate.version();

        if events.is_empty() {
            return Ok(PendingCommit {
                result: CommandResult {
                    aggregate,
                    events,
                    new_version: current_version,
                },
                request: None,
            });
        }

        aggregate.apply_events(events.iter().cloned());
        let tags = aggregate.tags();
        let envelopes = Self::build_envelopes(aggregate_id, current_version, &events, &tags)?;
        let new_version = envelopes
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        aggregate.set_version(new_version);

        // Version 0 means the stream must not exist yet
        let options = AppendOptions::expect_version(current_version);

        Ok(PendingCommit {
            result: CommandResult {
                aggregate,
                events,
                new_version,
            },
            request: Some(AppendRequest::new(envelopes, options)),
        })
    }

    /// Writes a single pending commit.
    pub async fn commit(&self, pending: PendingCommit<A>) -> Result<CommandResult<A>, DomainError> {
        let (request, result) = pending.into_parts();
        if let Some(request) = request {
            self.store.append_batch(vec![request]).await?;
        }
        Ok(result)
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let pending = self.prepare(aggregate_id, command_fn).await?;
        self.commit(pending).await
    }

    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
        tags: &[event_store::Tag],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .tags(tags.iter().cloned())
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}

/// Writes several pending commits as one atomic batch.
///
/// Requests with no events are skipped; an all-empty set writes nothing.
pub async fn commit_batch<S: EventStore + ?Sized>(
    store: &S,
    requests: impl IntoIterator<Item = Option<AppendRequest>>,
) -> Result<(), DomainError> {
    let requests: Vec<_> = requests.into_iter().flatten().collect();
    if requests.is_empty() {
        return Ok(());
    }
    store.append_batch(requests).await?;
    Ok(())
}
