//! Referential integrity for catalog deletions.
//!
//! Before a service or charging type is deleted, the guard counts bookings,
//! earnings, open quote requests and charging configurations that reference
//! it. Historical records block a plain delete; an admin can still force one
//! through a two-step override.

use event_store::{EventStore, TagGuard};

use crate::catalog::CatalogEntity;
use crate::error::DomainError;

mod check;
mod deletion;
mod service;
mod ticket;

pub use check::{DependencyCheckResult, DependencyCounts};
pub use deletion::{CatalogDeletion, CatalogEntityDeletedData, DeletionEvent};
pub use service::{DEFAULT_TICKET_TTL_SECS, DependencyGuard};
pub use ticket::OverrideTicket;

/// Fails `NotFound` if `entity` has already been deleted, and otherwise
/// returns a guard that keeps it that way until the caller's batch commits.
///
/// Writers that turn a stored snapshot into a new booking attach the guard,
/// so a delete that lands between this check and their commit aborts them.
pub(crate) async fn ensure_not_deleted<S: EventStore>(
    store: &S,
    entity: CatalogEntity,
) -> Result<TagGuard, DomainError> {
    let tag = entity.deletion_tag();
    if store.count_tagged(&tag).await? > 0 {
        return Err(DomainError::not_found(entity.noun(), entity.uuid()));
    }
    Ok(TagGuard::new(tag, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandHandler;
    use crate::value_objects::ServiceId;
    use chrono::Utc;
    use common::{Actor, AggregateId, UserId};
    use event_store::{AppendOptions, EventEnvelope, EventStoreError, InMemoryEventStore, Version};

    async fn record_deletion(store: &InMemoryEventStore, entity: CatalogEntity) {
        let data = CatalogEntityDeletedData {
            entity,
            actor: Actor::admin(UserId::new()),
            forced: false,
            overridden_warnings: Vec::new(),
            counts: DependencyCounts::default(),
            deleted_at: Utc::now(),
        };
        CommandHandler::<_, CatalogDeletion>::new(store.clone())
            .execute(CatalogDeletion::stream_id(&entity), |d| d.delete(data))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleted_entity_is_not_found() {
        let store = InMemoryEventStore::new();
        let entity = CatalogEntity::Service(ServiceId::new());
        record_deletion(&store, entity).await;

        let err = ensure_not_deleted(&store, entity).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "service", .. }));
    }

    #[tokio::test]
    async fn guard_aborts_a_commit_that_races_the_delete() {
        let store = InMemoryEventStore::new();
        let entity = CatalogEntity::Service(ServiceId::new());
        let guard = ensure_not_deleted(&store, entity).await.unwrap();

        record_deletion(&store, entity).await;

        let booking = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Booking")
            .event_type("BookingCreated")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .tag(entity.tag())
            .build()
            .unwrap();
        let result = store
            .append(vec![booking], AppendOptions::expect_new().with_guard(guard))
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::GuardViolated { actual: 1, .. })
        ));
        assert_eq!(store.count_tagged(&entity.tag()).await.unwrap(), 1);
    }
}
