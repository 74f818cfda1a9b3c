//! Quote request service: the direct quote flow for quote-only services.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, AggregateId, UserId};
use event_store::{EventQuery, EventStore};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::booking::{
    Booking, BookingCreatedData, BookingSource, ServiceSnapshot, party_tag,
};
use crate::cache::{CacheInvalidator, CacheKey};
use crate::catalog::{Catalog, CatalogEntity};
use crate::command::{CommandHandler, CommandResult, commit_batch};
use crate::error::DomainError;
use crate::guard::ensure_not_deleted;
use crate::value_objects::{Money, Quantity, ServiceId};

use super::{QuoteRequest, events::QuoteRequestedData};

/// Command to ask a provider for a price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestQuote {
    pub service_id: ServiceId,
    #[serde(default)]
    pub details: String,
}

pub struct QuoteService<S: EventStore + Clone> {
    quotes: CommandHandler<S, QuoteRequest>,
    bookings: CommandHandler<S, Booking>,
    catalog: Arc<dyn Catalog>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl<S: EventStore + Clone> QuoteService<S> {
    pub fn new(
        store: S,
        catalog: Arc<dyn Catalog>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            quotes: CommandHandler::new(store.clone()),
            bookings: CommandHandler::new(store),
            catalog,
            invalidator,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, QuoteRequest> {
        &self.quotes
    }

    #[tracing::instrument(skip(self, cmd), fields(service_id = %cmd.service_id))]
    pub async fn request_quote(
        &self,
        actor: &Actor,
        cmd: RequestQuote,
    ) -> Result<CommandResult<QuoteRequest>, DomainError> {
        if !actor.is_client() {
            return Err(DomainError::unauthorized("only clients request quotes"));
        }

        let service = self
            .catalog
            .get_service(cmd.service_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| DomainError::not_found("service", cmd.service_id))?;

        let quote_id = AggregateId::new();
        let data = QuoteRequestedData {
            quote_id,
            client_id: actor.id,
            provider_id: service.provider_id,
            service_id: service.id,
            service_name: service.name,
            service_description: service.description,
            category: service.category,
            details: cmd.details,
            requested_at: Utc::now(),
        };

        let result = self
            .quotes
            .execute(quote_id, |quote| quote.request(data))
            .await?;
        tracing::info!(%quote_id, client_id = %actor.id, "Quote requested");
        self.invalidate_parties(&result.aggregate);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn submit_quote(
        &self,
        actor: &Actor,
        quote_id: AggregateId,
        price: Money,
        message: Option<String>,
    ) -> Result<CommandResult<QuoteRequest>, DomainError> {
        let result = self
            .quotes
            .execute(quote_id, |quote| quote.submit(actor, price, message))
            .await
            .map_err(|e| with_quote_id(e, quote_id))?;
        self.invalidate_parties(&result.aggregate);
        Ok(result)
    }

    /// Accepts the quoted price, closing the request and opening a pending
    /// booking for one unit at that price in the same batch.
    #[tracing::instrument(skip(self))]
    pub async fn accept_quote(
        &self,
        actor: &Actor,
        quote_id: AggregateId,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let booking_id = AggregateId::new();
        let quote_commit = self
            .quotes
            .prepare(quote_id, |quote| quote.accept(actor, booking_id))
            .await
            .map_err(|e| with_quote_id(e, quote_id))?;

        let data = booking_from_quote(booking_id, quote_id, quote_commit.aggregate(), actor)?;
        let store = self.bookings.store();
        let service_guard =
            ensure_not_deleted(store, CatalogEntity::Service(data.snapshot.service_id)).await?;

        let booking = Booking::default();
        let events = booking.create(data)?;
        let booking_commit = CommandHandler::<S, Booking>::stage(booking_id, booking, events)?
            .with_guard(service_guard);

        let (quote_request, _) = quote_commit.into_parts();
        let (booking_request, result) = booking_commit.into_parts();
        commit_batch(store, [quote_request, booking_request]).await?;

        metrics::counter!("bookings_created_total", "source" => "quote").increment(1);
        tracing::info!(%quote_id, %booking_id, "Quote accepted");
        for user in [result.aggregate.client_id(), result.aggregate.provider_id()]
            .into_iter()
            .flatten()
        {
            self.invalidator.invalidate(CacheKey::UnreadCount(user));
        }
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn decline_quote(
        &self,
        actor: &Actor,
        quote_id: AggregateId,
        reason: Option<String>,
    ) -> Result<CommandResult<QuoteRequest>, DomainError> {
        let result = self
            .quotes
            .execute(quote_id, |quote| quote.decline(actor, reason))
            .await
            .map_err(|e| with_quote_id(e, quote_id))?;
        self.invalidate_parties(&result.aggregate);
        Ok(result)
    }

    pub async fn get_quote(
        &self,
        actor: &Actor,
        quote_id: AggregateId,
    ) -> Result<QuoteRequest, DomainError> {
        let quote = self
            .quotes
            .load_existing(quote_id)
            .await?
            .ok_or_else(|| DomainError::not_found("quote request", quote_id))?;
        if !quote.is_visible_to(actor) {
            return Err(DomainError::unauthorized(format!(
                "{actor} is not a party to quote request {quote_id}"
            )));
        }
        Ok(quote)
    }

    /// Quote requests where `user_id` is client or provider, oldest first.
    pub async fn list_for_party(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> Result<Vec<QuoteRequest>, DomainError> {
        if !actor.is_admin() && actor.id != user_id {
            return Err(DomainError::unauthorized(
                "quote requests are only listed for their parties",
            ));
        }
        let query = EventQuery::tagged(QuoteRequest::aggregate_type(), party_tag(user_id));
        let events = self.quotes.store().query_events(query).await?;
        CommandHandler::<S, QuoteRequest>::replay_streams(events)
    }

    fn invalidate_parties(&self, quote: &QuoteRequest) {
        for user in [quote.client_id(), quote.provider_id()]
            .into_iter()
            .flatten()
        {
            self.invalidator.invalidate(CacheKey::UnreadCount(user));
        }
    }
}

fn with_quote_id(error: DomainError, quote_id: AggregateId) -> DomainError {
    match error {
        DomainError::NotFound { entity, .. } => DomainError::not_found(entity, quote_id),
        other => other,
    }
}

fn booking_from_quote(
    booking_id: AggregateId,
    quote_id: AggregateId,
    quote: &QuoteRequest,
    actor: &Actor,
) -> Result<BookingCreatedData, DomainError> {
    let (Some(client_id), Some(provider_id), Some(service_id), Some(price)) = (
        quote.client_id(),
        quote.provider_id(),
        quote.service_id(),
        quote.quoted_price(),
    ) else {
        return Err(DomainError::not_found("quote request", quote_id));
    };

    let details = quote.details();
    Ok(BookingCreatedData {
        booking_id,
        client_id,
        provider_id,
        source: BookingSource::Quote(quote_id),
        snapshot: ServiceSnapshot {
            service_id,
            service_name: quote.service_name().to_string(),
            description: quote.service_description().to_string(),
            category: quote.category().to_string(),
            charging: None,
            unit_price: price,
            quantity: Quantity::default(),
            notes: (!details.is_empty()).then(|| details.to_string()),
        },
        actor: *actor,
        created_at: Utc::now(),
    })
}
