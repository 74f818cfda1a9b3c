//! Persistence collaborator for the booking lifecycle engine.
//!
//! Every cart item, booking, quote request and catalog deletion is an
//! append-only stream of events. Appends are conditional on the stream's
//! current version, can be committed across several streams at once, and can
//! be guarded on "nothing referencing this tag was written since I looked".

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Tag, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EventQuery;
pub use store::{AppendOptions, AppendRequest, EventStore, EventStoreExt, EventStream, TagGuard};
