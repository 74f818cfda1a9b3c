//! Errors raised while folding events into read models.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Reading the event log failed; the view keeps its last position.
    #[error("event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A booking or earning payload did not match its event schema.
    #[error("undecodable event payload: {0}")]
    Deserialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
