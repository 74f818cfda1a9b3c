//! Dependency guard: counts what references a catalog entity before it goes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::Actor;
use event_store::{EventQuery, EventStore, TagGuard};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::booking::Booking;
use crate::catalog::{Catalog, CatalogEntity};
use crate::command::{CommandHandler, CommandResult};
use crate::earnings::ProviderEarning;
use crate::error::DomainError;
use crate::quote::QuoteRequest;
use crate::value_objects::ServiceId;

use super::{
    CatalogDeletion, CatalogEntityDeletedData, DependencyCheckResult, DependencyCounts,
    OverrideTicket, ticket::TicketBook,
};

/// Default lifetime of an override ticket.
pub const DEFAULT_TICKET_TTL_SECS: i64 = 300;

/// Decides whether a catalog entity can be deleted and performs guarded
/// deletes.
///
/// Every delete is written with a tag guard on the entity, so a booking or
/// quote that starts referencing it after the check aborts the delete.
pub struct DependencyGuard<S: EventStore> {
    deletions: CommandHandler<S, CatalogDeletion>,
    catalog: Arc<dyn Catalog>,
    tickets: TicketBook,
    ticket_ttl: Duration,
}

impl<S: EventStore> DependencyGuard<S> {
    pub fn new(store: S, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            deletions: CommandHandler::new(store),
            catalog,
            tickets: TicketBook::default(),
            ticket_ttl: Duration::seconds(DEFAULT_TICKET_TTL_SECS),
        }
    }

    pub fn with_ticket_ttl(mut self, ttl: Duration) -> Self {
        self.ticket_ttl = ttl;
        self
    }

    fn store(&self) -> &S {
        self.deletions.store()
    }

    /// Counts the records referencing `entity`. Never changes anything.
    #[tracing::instrument(skip(self))]
    pub async fn check_deletable(
        &self,
        entity: CatalogEntity,
    ) -> Result<DependencyCheckResult, DomainError> {
        if !self.catalog.exists(entity).await? {
            return Err(DomainError::not_found(entity.noun(), entity.uuid()));
        }

        let tag = entity.tag();
        let tagged_events = self.store().count_tagged(&tag).await?;

        let order_items = self
            .store()
            .query_events(
                EventQuery::tagged(Booking::aggregate_type(), tag.clone())
                    .event_type("BookingCreated"),
            )
            .await?
            .len() as u64;

        let provider_earnings = self
            .store()
            .query_events(
                EventQuery::tagged(ProviderEarning::aggregate_type(), tag.clone())
                    .event_type("EarningRecorded"),
            )
            .await?
            .len() as u64;

        let quote_events = self
            .store()
            .query_events(EventQuery::tagged(QuoteRequest::aggregate_type(), tag))
            .await?;
        let service_requests =
            CommandHandler::<S, QuoteRequest>::replay_streams(quote_events)?
                .iter()
                .filter(|quote| quote.status().is_open())
                .count() as u64;

        let charging_types = self.catalog.charging_configurations(entity).await?;

        let counts = DependencyCounts {
            order_items,
            charging_types,
            service_requests,
            provider_earnings,
        };
        Ok(DependencyCheckResult::new(entity, counts, tagged_events))
    }

    /// Deletes `entity` if nothing transactional references it.
    ///
    /// Admins may delete anything; a provider may delete their own service.
    #[tracing::instrument(skip(self))]
    pub async fn delete(
        &self,
        entity: CatalogEntity,
        actor: &Actor,
    ) -> Result<CommandResult<CatalogDeletion>, DomainError> {
        self.authorize(entity, actor).await?;

        let check = self.check_deletable(entity).await?;
        if !check.can_delete {
            return Err(DomainError::DependencyBlocked {
                warnings: check.warnings,
            });
        }

        let data = CatalogEntityDeletedData {
            entity,
            actor: *actor,
            forced: false,
            overridden_warnings: Vec::new(),
            counts: check.counts,
            deleted_at: Utc::now(),
        };
        let result = self.commit_deletion(data, check.tagged_events).await?;

        metrics::counter!("catalog_deletions_total", "forced" => "false").increment(1);
        tracing::info!(%entity, actor = %actor, warnings = ?check.warnings, "Catalog entity deleted");
        Ok(result)
    }

    /// First step of an override: shows the admin what they are about to
    /// orphan and hands back a ticket to confirm with.
    #[tracing::instrument(skip(self))]
    pub async fn request_forced_delete(
        &self,
        entity: CatalogEntity,
        actor: &Actor,
    ) -> Result<OverrideTicket, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::unauthorized("only admins can force a deletion"));
        }

        let check = self.check_deletable(entity).await?;
        let ticket = OverrideTicket::issue(check, actor.id, self.ticket_ttl);
        self.tickets.insert(ticket.clone()).await;

        tracing::info!(
            ticket_id = %ticket.ticket_id,
            %entity,
            admin = %actor.id,
            "Override ticket issued"
        );
        Ok(ticket)
    }

    /// Second step of an override.
    ///
    /// Fails `ConcurrentModification` if the counts moved since the ticket
    /// was issued; the ticket is spent either way.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_forced_delete(
        &self,
        ticket_id: Uuid,
        actor: &Actor,
    ) -> Result<CommandResult<CatalogDeletion>, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::unauthorized("only admins can force a deletion"));
        }

        let ticket = self.tickets.redeem(ticket_id, actor.id).await?;
        let entity = ticket.entity;

        let check = self.check_deletable(entity).await?;
        if !ticket.matches(&check) {
            return Err(DomainError::ConcurrentModification(format!(
                "dependencies of {entity} changed since ticket {ticket_id} was issued"
            )));
        }

        let data = CatalogEntityDeletedData {
            entity,
            actor: *actor,
            forced: true,
            overridden_warnings: ticket.warnings.clone(),
            counts: ticket.counts,
            deleted_at: Utc::now(),
        };
        let result = self.commit_deletion(data, ticket.tagged_events).await?;

        metrics::counter!("catalog_deletions_total", "forced" => "true").increment(1);
        tracing::warn!(
            %entity,
            actor = %actor,
            %ticket_id,
            overridden_warnings = ?ticket.warnings,
            "Forced deletion of catalog entity"
        );
        Ok(result)
    }

    /// Hides a service from new carts and quotes without touching history.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_service(
        &self,
        service_id: ServiceId,
        actor: &Actor,
    ) -> Result<(), DomainError> {
        let entity = CatalogEntity::Service(service_id);
        self.authorize(entity, actor).await?;
        self.catalog.deactivate(service_id).await?;
        tracing::info!(%service_id, actor = %actor, "Service deactivated");
        Ok(())
    }

    /// The deletion record for `entity`, if it was deleted through the guard.
    pub async fn deletion_record(
        &self,
        entity: CatalogEntity,
    ) -> Result<Option<CatalogDeletion>, DomainError> {
        self.deletions
            .load_existing(CatalogDeletion::stream_id(&entity))
            .await
    }

    /// Removes every entity with a deletion record from the catalog.
    ///
    /// Run at startup after seeding, so deletions persisted in the store are
    /// not undone by a catalog rebuilt from its seed. Returns how many
    /// records were applied.
    #[tracing::instrument(skip(self))]
    pub async fn reapply_deletions(&self) -> Result<usize, DomainError> {
        let events = self
            .store()
            .query_events(
                EventQuery::new()
                    .aggregate_type(CatalogDeletion::aggregate_type())
                    .event_type("CatalogEntityDeleted"),
            )
            .await?;
        let deletions = CommandHandler::<S, CatalogDeletion>::replay_streams(events)?;

        let mut applied = 0;
        for record in deletions.iter().filter_map(CatalogDeletion::record) {
            self.catalog.remove(record.entity).await?;
            applied += 1;
        }
        if applied > 0 {
            tracing::info!(applied, "Catalog deletions reapplied");
        }
        Ok(applied)
    }

    async fn authorize(&self, entity: CatalogEntity, actor: &Actor) -> Result<(), DomainError> {
        if actor.is_admin() {
            return Ok(());
        }

        let owns = match entity {
            CatalogEntity::Service(id) if actor.is_provider() => self
                .catalog
                .get_service(id)
                .await?
                .is_some_and(|service| service.provider_id == actor.id),
            _ => false,
        };
        if owns {
            Ok(())
        } else {
            Err(DomainError::unauthorized(format!(
                "{actor} may not delete {entity}"
            )))
        }
    }

    /// Appends the deletion record on the condition that the number of
    /// events referencing the entity is still `tagged_events`, then removes
    /// the entity from the catalog.
    async fn commit_deletion(
        &self,
        data: CatalogEntityDeletedData,
        tagged_events: u64,
    ) -> Result<CommandResult<CatalogDeletion>, DomainError> {
        let entity = data.entity;
        let pending = self
            .deletions
            .prepare(CatalogDeletion::stream_id(&entity), |deletion| {
                deletion.delete(data)
            })
            .await?
            .with_guard(TagGuard::new(entity.tag(), tagged_events));

        let result = self.deletions.commit(pending).await?;
        self.catalog.remove(entity).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingService;
    use crate::cache::NoopInvalidator;
    use crate::cart::{AddCartItem, CartService};
    use crate::catalog::{CatalogService, InMemoryCatalog};
    use crate::error::ErrorKind;
    use crate::testing;
    use common::UserId;
    use event_store::InMemoryEventStore;

    struct Fixture {
        store: InMemoryEventStore,
        catalog: InMemoryCatalog,
        guard: DependencyGuard<InMemoryEventStore>,
        service: CatalogService,
        admin: Actor,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryEventStore::new();
        let catalog = InMemoryCatalog::new();
        let service = testing::desentupimento(UserId::new());
        catalog.insert_service(service.clone()).await;
        Fixture {
            guard: DependencyGuard::new(store.clone(), Arc::new(catalog.clone())),
            store,
            catalog,
            service,
            admin: Actor::admin(UserId::new()),
        }
    }

    async fn book(f: &Fixture, times: usize) {
        let cart = CartService::new(
            f.store.clone(),
            Arc::new(f.catalog.clone()),
            Arc::new(NoopInvalidator),
        );
        let bookings = BookingService::new(f.store.clone(), Arc::new(NoopInvalidator));
        let client = Actor::client(UserId::new());
        for _ in 0..times {
            let item = cart
                .add_item(&client, AddCartItem::new(f.service.id))
                .await
                .unwrap();
            bookings
                .checkout(&client, item.aggregate.id().unwrap())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn unreferenced_service_is_deletable() {
        let f = fixture().await;
        let entity = CatalogEntity::Service(f.service.id);

        let check = f.guard.check_deletable(entity).await.unwrap();
        assert!(check.can_delete);
        assert_eq!(check.counts.charging_types, 1);
        assert_eq!(
            check.warnings,
            vec!["this service has 1 charging type configuration"]
        );

        f.guard.delete(entity, &f.admin).await.unwrap();
        assert!(!f.catalog.exists(entity).await.unwrap());

        let record = f.guard.deletion_record(entity).await.unwrap().unwrap();
        assert!(!record.record().unwrap().forced);
    }

    #[tokio::test]
    async fn linked_orders_block_plain_delete() {
        let f = fixture().await;
        book(&f, 2).await;
        let entity = CatalogEntity::Service(f.service.id);

        let check = f.guard.check_deletable(entity).await.unwrap();
        assert!(!check.can_delete);
        assert_eq!(check.counts.order_items, 2);

        let err = f.guard.delete(entity, &f.admin).await.unwrap_err();
        assert!(
            matches!(err, DomainError::DependencyBlocked { ref warnings } if warnings[0] == "this service has 2 linked orders")
        );
        assert!(f.catalog.exists(entity).await.unwrap());
    }

    #[tokio::test]
    async fn check_never_writes() {
        let f = fixture().await;
        book(&f, 1).await;
        let before = f.store.event_count().await;

        f.guard
            .check_deletable(CatalogEntity::Service(f.service.id))
            .await
            .unwrap();

        assert_eq!(f.store.event_count().await, before);
    }

    #[tokio::test]
    async fn providers_delete_only_their_own_services() {
        let f = fixture().await;
        let entity = CatalogEntity::Service(f.service.id);

        let stranger = f
            .guard
            .delete(entity, &Actor::provider(UserId::new()))
            .await
            .unwrap_err();
        assert_eq!(stranger.kind(), ErrorKind::Unauthorized);

        f.guard
            .delete(entity, &Actor::provider(f.service.provider_id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn override_deletes_and_records_warnings() {
        let f = fixture().await;
        book(&f, 3).await;
        let entity = CatalogEntity::Service(f.service.id);

        let ticket = f
            .guard
            .request_forced_delete(entity, &f.admin)
            .await
            .unwrap();
        assert_eq!(ticket.counts.order_items, 3);

        let result = f
            .guard
            .confirm_forced_delete(ticket.ticket_id, &f.admin)
            .await
            .unwrap();

        let record = result.aggregate.record().unwrap();
        assert!(record.forced);
        assert_eq!(record.overridden_warnings, ticket.warnings);
        assert!(!f.catalog.exists(entity).await.unwrap());
    }

    #[tokio::test]
    async fn override_is_invalidated_by_new_references() {
        let f = fixture().await;
        book(&f, 1).await;
        let entity = CatalogEntity::Service(f.service.id);

        let ticket = f
            .guard
            .request_forced_delete(entity, &f.admin)
            .await
            .unwrap();
        book(&f, 1).await;

        let err = f
            .guard
            .confirm_forced_delete(ticket.ticket_id, &f.admin)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConcurrentModification);
        assert!(f.catalog.exists(entity).await.unwrap());

        // The ticket was spent
        let again = f
            .guard
            .confirm_forced_delete(ticket.ticket_id, &f.admin)
            .await
            .unwrap_err();
        assert_eq!(again.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn only_admins_force() {
        let f = fixture().await;
        let err = f
            .guard
            .request_forced_delete(
                CatalogEntity::Service(f.service.id),
                &Actor::provider(f.service.provider_id),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn unknown_entity_is_not_found() {
        let f = fixture().await;
        let err = f
            .guard
            .check_deletable(CatalogEntity::Service(ServiceId::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deletions_survive_a_reseeded_catalog() {
        let f = fixture().await;
        let entity = CatalogEntity::Service(f.service.id);
        f.guard.delete(entity, &f.admin).await.unwrap();

        // A restart rebuilds the catalog from the same seed
        let reseeded = InMemoryCatalog::new();
        reseeded.insert_service(f.service.clone()).await;
        let guard = DependencyGuard::new(f.store.clone(), Arc::new(reseeded.clone()));
        assert!(reseeded.exists(entity).await.unwrap());

        assert_eq!(guard.reapply_deletions().await.unwrap(), 1);
        assert!(!reseeded.exists(entity).await.unwrap());
    }

    #[tokio::test]
    async fn nothing_to_reapply_on_a_fresh_store() {
        let f = fixture().await;
        assert_eq!(f.guard.reapply_deletions().await.unwrap(), 0);
        assert!(
            f.catalog
                .exists(CatalogEntity::Service(f.service.id))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn deactivation_keeps_history_intact() {
        let f = fixture().await;
        book(&f, 1).await;

        f.guard
            .deactivate_service(f.service.id, &f.admin)
            .await
            .unwrap();

        let service = f.catalog.get_service(f.service.id).await.unwrap().unwrap();
        assert!(!service.is_active);
    }
}
