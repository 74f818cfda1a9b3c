//! Booking service: checkout and lifecycle transitions.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, AggregateId, UserId};
use event_store::{EventQuery, EventStore};

use crate::aggregate::Aggregate;
use crate::cache::{CacheInvalidator, CacheKey};
use crate::cart::CartItem;
use crate::catalog::CatalogEntity;
use crate::command::{CommandHandler, CommandResult, commit_batch};
use crate::earnings::ProviderEarning;
use crate::error::DomainError;
use crate::guard::ensure_not_deleted;
use crate::retry::RetryPolicy;

use super::{
    Booking, BookingCreatedData, BookingSource, BookingStatus, ServiceSnapshot, party_tag,
};

/// Service for creating bookings and moving them through their lifecycle.
pub struct BookingService<S: EventStore + Clone> {
    bookings: CommandHandler<S, Booking>,
    cart: CommandHandler<S, CartItem>,
    earnings: CommandHandler<S, ProviderEarning>,
    invalidator: Arc<dyn CacheInvalidator>,
    retry: RetryPolicy,
}

impl<S: EventStore + Clone> BookingService<S> {
    pub fn new(store: S, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self {
            bookings: CommandHandler::new(store.clone()),
            cart: CommandHandler::new(store.clone()),
            earnings: CommandHandler::new(store),
            invalidator,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets how often a lost race is retried with fresh reads.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn handler(&self) -> &CommandHandler<S, Booking> {
        &self.bookings
    }

    /// Converts a cart item into a pending booking.
    ///
    /// The item's `CartItemCheckedOut` and the booking's `BookingCreated` are
    /// written in one batch, so two concurrent checkouts of the same item
    /// produce exactly one booking.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(
        &self,
        actor: &Actor,
        item_id: AggregateId,
    ) -> Result<CommandResult<Booking>, DomainError> {
        if !actor.is_client() {
            return Err(DomainError::unauthorized("only clients can check out"));
        }

        let result = self
            .retry
            .run(|| self.checkout_once(actor, item_id))
            .await?;

        let booking = &result.aggregate;
        metrics::counter!("bookings_created_total", "source" => "cart").increment(1);
        tracing::info!(
            booking_id = ?booking.id(),
            %item_id,
            client_id = %actor.id,
            "Cart item checked out"
        );

        self.invalidator.invalidate(CacheKey::Cart(actor.id));
        self.invalidate_parties(booking);
        Ok(result)
    }

    async fn checkout_once(
        &self,
        actor: &Actor,
        item_id: AggregateId,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let booking_id = AggregateId::new();
        let item_commit = self
            .cart
            .prepare(item_id, |item| item.check_out(actor, item_id, booking_id))
            .await?;

        let data = booking_from_item(booking_id, item_id, item_commit.aggregate(), actor)?;

        // The item may outlive a delete of what it snapshotted
        let store = self.bookings.store();
        let service_guard =
            ensure_not_deleted(store, CatalogEntity::Service(data.snapshot.service_id)).await?;
        let item_commit = match data.snapshot.charging {
            Some(charging) => item_commit.with_guard(
                ensure_not_deleted(store, CatalogEntity::ChargingType(charging.charging_type_id))
                    .await?,
            ),
            None => item_commit,
        };

        let booking = Booking::default();
        let events = booking.create(data)?;
        let booking_commit = CommandHandler::<S, Booking>::stage(booking_id, booking, events)?
            .with_guard(service_guard);

        let (item_request, _) = item_commit.into_parts();
        let (booking_request, result) = booking_commit.into_parts();
        commit_batch(store, [item_request, booking_request]).await?;
        Ok(result)
    }

    /// Moves a booking to `to`.
    ///
    /// Completing a booking records the provider's earning in the same batch.
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        actor: &Actor,
        booking_id: AggregateId,
        to: BookingStatus,
        reason: Option<String>,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let result = self
            .retry
            .run(|| self.transition_once(actor, booking_id, to, reason.clone()))
            .await
            .map_err(|e| match e {
                DomainError::NotFound { entity, .. } => DomainError::not_found(entity, booking_id),
                other => other,
            })?;

        metrics::counter!("booking_transitions_total", "to" => to.as_str()).increment(1);
        tracing::info!(
            %booking_id,
            actor = %actor,
            status = %to,
            "Booking status changed"
        );

        self.invalidate_parties(&result.aggregate);
        Ok(result)
    }

    async fn transition_once(
        &self,
        actor: &Actor,
        booking_id: AggregateId,
        to: BookingStatus,
        reason: Option<String>,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let booking_commit = self
            .bookings
            .prepare(booking_id, |booking| booking.transition(actor, to, reason))
            .await?;

        let earning_request = if to == BookingStatus::Completed {
            let earning_id = AggregateId::new();
            let earning = ProviderEarning::default();
            let events = earning.record(earning_id, booking_commit.aggregate())?;
            let (request, _) =
                CommandHandler::<S, ProviderEarning>::stage(earning_id, earning, events)?
                    .into_parts();
            request
        } else {
            None
        };

        let (booking_request, result) = booking_commit.into_parts();
        commit_batch(self.bookings.store(), [booking_request, earning_request]).await?;
        Ok(result)
    }

    /// Loads a booking the actor is allowed to see.
    #[tracing::instrument(skip(self))]
    pub async fn get_booking(
        &self,
        actor: &Actor,
        booking_id: AggregateId,
    ) -> Result<Booking, DomainError> {
        let booking = self
            .bookings
            .load_existing(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("booking", booking_id))?;

        if !booking.is_visible_to(actor) {
            return Err(DomainError::unauthorized(format!(
                "{actor} is not a party to booking {booking_id}"
            )));
        }
        Ok(booking)
    }

    /// Bookings where `user_id` is client or provider, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_party(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<Vec<Booking>, DomainError> {
        if !actor.is_admin() && actor.id != user_id {
            return Err(DomainError::unauthorized(
                "bookings are only listed for their parties",
            ));
        }

        let query = EventQuery::tagged(Booking::aggregate_type(), party_tag(user_id));
        let events = self.bookings.store().query_events(query).await?;
        let mut bookings = CommandHandler::<S, Booking>::replay_streams(events)?;
        bookings.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(bookings)
    }

    fn invalidate_parties(&self, booking: &Booking) {
        for user in [booking.client_id(), booking.provider_id()]
            .into_iter()
            .flatten()
        {
            self.invalidator.invalidate(CacheKey::UnreadCount(user));
        }
    }
}

fn booking_from_item(
    booking_id: AggregateId,
    item_id: AggregateId,
    item: &CartItem,
    actor: &Actor,
) -> Result<BookingCreatedData, DomainError> {
    let (Some(client_id), Some(provider_id), Some(service_id)) =
        (item.client_id(), item.provider_id(), item.service_id())
    else {
        return Err(DomainError::StaleCartItem(item_id.to_string()));
    };

    Ok(BookingCreatedData {
        booking_id,
        client_id,
        provider_id,
        source: BookingSource::CartItem(item_id),
        snapshot: ServiceSnapshot {
            service_id,
            service_name: item.service_name().to_string(),
            description: item.service_description().to_string(),
            category: item.category().to_string(),
            charging: item.charging(),
            unit_price: item.unit_price(),
            quantity: item.quantity(),
            notes: item.notes().map(str::to_string),
        },
        actor: *actor,
        created_at: Utc::now(),
    })
}
