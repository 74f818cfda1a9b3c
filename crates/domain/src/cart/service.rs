//! Cart service providing the client-facing cart operations.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, AggregateId, UserId};
use event_store::{EventQuery, EventStore, Tag};

use crate::aggregate::Aggregate;
use crate::cache::{CacheInvalidator, CacheKey};
use crate::catalog::{Catalog, ChargingSelection};
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::pricing::{PriceResolution, resolve_price};
use crate::value_objects::Quantity;

use super::{AddCartItem, CartItem, CartItemAddedData};

/// Service for managing client carts.
///
/// Prices are resolved against the catalog once, when the item is added;
/// everything afterwards works from the snapshot on the item's stream.
pub struct CartService<S: EventStore> {
    handler: CommandHandler<S, CartItem>,
    catalog: Arc<dyn Catalog>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl<S: EventStore> CartService<S> {
    pub fn new(
        store: S,
        catalog: Arc<dyn Catalog>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            catalog,
            invalidator,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, CartItem> {
        &self.handler
    }

    /// Adds a priced service to the caller's cart.
    ///
    /// Unknown or deactivated services are `NotFound`; services without a
    /// resolvable price are `QuoteOnlyService` and must go through a quote
    /// request instead.
    #[tracing::instrument(skip(self, cmd), fields(service_id = %cmd.service_id))]
    pub async fn add_item(
        &self,
        actor: &Actor,
        cmd: AddCartItem,
    ) -> Result<CommandResult<CartItem>, DomainError> {
        if !actor.is_client() {
            return Err(DomainError::unauthorized("only clients have carts"));
        }

        let service = self
            .catalog
            .get_service(cmd.service_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| DomainError::not_found("service", cmd.service_id))?;

        let (option, unit_price) =
            match resolve_price(&service, &service.charging_options, cmd.charging_type_id) {
                PriceResolution::Priced { option, unit_price } => (option, unit_price),
                PriceResolution::QuoteOnly => {
                    return Err(DomainError::QuoteOnlyService {
                        service: service.name,
                    });
                }
            };

        let item_id = AggregateId::new();
        let data = CartItemAddedData {
            item_id,
            client_id: actor.id,
            provider_id: service.provider_id,
            service_id: service.id,
            service_name: service.name,
            service_description: service.description,
            category: service.category,
            charging: option.as_ref().map(ChargingSelection::from),
            unit_price,
            quantity: Quantity::clamped(cmd.quantity),
            notes: cmd.notes,
            added_at: Utc::now(),
        };

        let result = self.handler.execute(item_id, |item| item.add(data)).await?;

        metrics::counter!("cart_items_added_total").increment(1);
        tracing::info!(
            %item_id,
            client_id = %actor.id,
            unit_price = %unit_price,
            "Cart item added"
        );
        self.invalidator.invalidate(CacheKey::Cart(actor.id));
        Ok(result)
    }

    /// Sets an item's quantity, clamped into `[1, 10]`.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        actor: &Actor,
        item_id: AggregateId,
        quantity: i64,
    ) -> Result<CommandResult<CartItem>, DomainError> {
        let result = self
            .handler
            .execute(item_id, |item| item.set_quantity(actor, quantity))
            .await
            .map_err(|e| not_found_as(e, item_id))?;

        if !result.events.is_empty() {
            self.invalidator.invalidate(CacheKey::Cart(actor.id));
        }
        Ok(result)
    }

    /// Takes an item out of the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        actor: &Actor,
        item_id: AggregateId,
    ) -> Result<CommandResult<CartItem>, DomainError> {
        let result = self
            .handler
            .execute(item_id, |item| item.remove(actor))
            .await
            .map_err(|e| not_found_as(e, item_id))?;

        self.invalidator.invalidate(CacheKey::Cart(actor.id));
        Ok(result)
    }

    /// Lists the caller's active items, oldest first.
    ///
    /// Clients see their own cart; admins may pass any client id.
    #[tracing::instrument(skip(self))]
    pub async fn list_items(
        &self,
        actor: &Actor,
        client_id: UserId,
    ) -> Result<Vec<CartItem>, DomainError> {
        let allowed = actor.is_admin() || (actor.is_client() && actor.id == client_id);
        if !allowed {
            return Err(DomainError::unauthorized(
                "a cart is only visible to its owner",
            ));
        }

        let query = EventQuery::tagged(CartItem::aggregate_type(), Tag::new("client", client_id));
        let events = self.handler.store().query_events(query).await?;

        let mut items: Vec<CartItem> = CommandHandler::<S, CartItem>::replay_streams(events)?
            .into_iter()
            .filter(CartItem::is_active)
            .collect();
        items.sort_by_key(|item| item.added_at());
        Ok(items)
    }
}

/// Fills in the item id on errors raised before the stream existed.
fn not_found_as(error: DomainError, item_id: AggregateId) -> DomainError {
    match error {
        DomainError::NotFound { entity, .. } => DomainError::not_found(entity, item_id),
        other => other,
    }
}
