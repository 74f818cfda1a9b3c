//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::booking::BookingStatus;

/// Errors that can occur during booking lifecycle operations.
///
/// Every public operation returns one of these; none are swallowed.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The actor's role or identity does not permit the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The service has no resolvable price and must go through a quote request.
    #[error("Service {service} is quote-only and cannot be added to a cart")]
    QuoteOnlyService { service: String },

    /// The requested status change is not in the transition table.
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// The cart item was already checked out or removed.
    #[error("Cart item {0} is no longer in the cart")]
    StaleCartItem(String),

    /// Another writer changed the entity after it was read.
    #[error("Concurrent modification of {0}; retry with fresh data")]
    ConcurrentModification(String),

    /// Deletion refused because historical records reference the entity.
    #[error("Deletion blocked: {}", warnings.join("; "))]
    DependencyBlocked { warnings: Vec<String> },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request itself is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An external collaborator (catalog, chat) failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

/// Coarse classification of a [`DomainError`], for callers that map errors
/// onto another protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    QuoteOnlyService,
    IllegalTransition,
    StaleCartItem,
    ConcurrentModification,
    DependencyBlocked,
    NotFound,
    Validation,
    Internal,
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        DomainError::Unauthorized(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Unauthorized(_) => ErrorKind::Unauthorized,
            DomainError::QuoteOnlyService { .. } => ErrorKind::QuoteOnlyService,
            DomainError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            DomainError::StaleCartItem(_) => ErrorKind::StaleCartItem,
            DomainError::ConcurrentModification(_) => ErrorKind::ConcurrentModification,
            DomainError::DependencyBlocked { .. } => ErrorKind::DependencyBlocked,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::EventStore(_)
            | DomainError::Serialization(_)
            | DomainError::Collaborator(_) => ErrorKind::Internal,
        }
    }

    /// Only a lost optimistic-concurrency race is worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ConcurrentModification
    }
}

impl From<EventStoreError> for DomainError {
    fn from(e: EventStoreError) -> Self {
        if e.is_conflict() {
            metrics::counter!("concurrency_conflicts_total").increment(1);
            DomainError::ConcurrentModification(e.to_string())
        } else {
            DomainError::EventStore(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::Version;

    #[test]
    fn store_conflicts_become_concurrent_modification() {
        let err: DomainError = EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::first(),
            actual: Version::new(2),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
        assert!(err.is_retryable());
    }

    #[test]
    fn other_store_errors_are_internal() {
        let err: DomainError = EventStoreError::InvalidAppend("bad".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn dependency_blocked_lists_warnings() {
        let err = DomainError::DependencyBlocked {
            warnings: vec!["this service has 12 linked orders".into()],
        };
        assert!(err.to_string().contains("12 linked orders"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn illegal_transition_names_both_states() {
        let err = DomainError::IllegalTransition {
            from: BookingStatus::Accepted,
            to: BookingStatus::Completed,
        };
        assert_eq!(err.to_string(), "Illegal transition from accepted to completed");
    }
}
