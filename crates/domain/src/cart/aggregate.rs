//! Cart item aggregate.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, UserId};
use event_store::{Tag, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::{CatalogEntity, ChargingSelection};
use crate::error::DomainError;
use crate::value_objects::{Money, Quantity, ServiceId};

use super::{CartItemEvent, events::CartItemAddedData};

/// Where a cart item is in its short life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartItemStatus {
    #[default]
    Active,
    Removed,
    CheckedOut,
}

/// One priced line item in a client's cart.
///
/// Each "add to cart" creates its own stream; adding the same service twice
/// gives two items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartItem {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    client_id: Option<UserId>,
    provider_id: Option<UserId>,
    service_id: Option<ServiceId>,
    service_name: String,
    service_description: String,
    category: String,
    charging: Option<ChargingSelection>,
    unit_price: Money,
    quantity: Quantity,
    notes: Option<String>,
    added_at: Option<DateTime<Utc>>,
    status: CartItemStatus,
    booking_id: Option<AggregateId>,
}

impl Aggregate for CartItem {
    type Event = CartItemEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "CartItem"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartItemEvent::CartItemAdded(data) => self.apply_added(data),
            CartItemEvent::QuantityChanged(data) => self.quantity = data.new_quantity,
            CartItemEvent::CartItemRemoved(_) => self.status = CartItemStatus::Removed,
            CartItemEvent::CartItemCheckedOut(data) => {
                self.status = CartItemStatus::CheckedOut;
                self.booking_id = Some(data.booking_id);
            }
        }
    }

    fn tags(&self) -> Vec<Tag> {
        let mut tags = Vec::new();
        if let Some(client_id) = self.client_id {
            tags.push(Tag::new("client", client_id));
        }
        if let Some(service_id) = self.service_id {
            tags.push(CatalogEntity::Service(service_id).tag());
        }
        if let Some(charging) = self.charging {
            tags.push(CatalogEntity::ChargingType(charging.charging_type_id).tag());
        }
        tags
    }
}

// Query methods
impl CartItem {
    pub fn client_id(&self) -> Option<UserId> {
        self.client_id
    }

    pub fn provider_id(&self) -> Option<UserId> {
        self.provider_id
    }

    pub fn service_id(&self) -> Option<ServiceId> {
        self.service_id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_description(&self) -> &str {
        &self.service_description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn charging(&self) -> Option<ChargingSelection> {
        self.charging
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        self.added_at
    }

    pub fn status(&self) -> CartItemStatus {
        self.status
    }

    pub fn booking_id(&self) -> Option<AggregateId> {
        self.booking_id
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.status == CartItemStatus::Active
    }

    /// Line total at the snapshot price.
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity.get())
    }
}

// Command methods (return events)
impl CartItem {
    /// Puts a new item in the cart.
    pub fn add(&self, data: CartItemAddedData) -> Result<Vec<CartItemEvent>, DomainError> {
        if self.id.is_some() {
            return Err(DomainError::Validation(format!(
                "cart item {} already exists",
                data.item_id
            )));
        }
        Ok(vec![CartItemEvent::CartItemAdded(data)])
    }

    /// Sets the quantity, clamped into range. No change, no event.
    pub fn set_quantity(
        &self,
        actor: &Actor,
        requested: i64,
    ) -> Result<Vec<CartItemEvent>, DomainError> {
        self.ensure_owner(actor)?;
        self.ensure_active()?;

        let new_quantity = Quantity::clamped(requested);
        if new_quantity == self.quantity {
            return Ok(vec![]);
        }
        Ok(vec![CartItemEvent::quantity_changed(
            self.quantity,
            new_quantity,
        )])
    }

    pub fn remove(&self, actor: &Actor) -> Result<Vec<CartItemEvent>, DomainError> {
        self.ensure_owner(actor)?;
        self.ensure_active()?;
        Ok(vec![CartItemEvent::removed()])
    }

    /// Marks the item as converted into `booking_id`.
    ///
    /// A missing, removed or already checked-out item is stale: the caller's
    /// view of the cart is out of date.
    pub fn check_out(
        &self,
        actor: &Actor,
        item_id: AggregateId,
        booking_id: AggregateId,
    ) -> Result<Vec<CartItemEvent>, DomainError> {
        if !self.is_active() {
            return Err(DomainError::StaleCartItem(item_id.to_string()));
        }
        self.ensure_owner(actor)?;
        Ok(vec![CartItemEvent::checked_out(booking_id)])
    }

    fn ensure_owner(&self, actor: &Actor) -> Result<(), DomainError> {
        match self.client_id {
            None => Err(DomainError::not_found(
                "cart item",
                self.id.map(|id| id.to_string()).unwrap_or_default(),
            )),
            Some(owner) if actor.is_client() && actor.id == owner => Ok(()),
            Some(_) => Err(DomainError::unauthorized(
                "only the owning client may change a cart item",
            )),
        }
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DomainError::not_found(
                "cart item",
                self.id.map(|id| id.to_string()).unwrap_or_default(),
            ))
        }
    }
}

// Apply event helpers
impl CartItem {
    fn apply_added(&mut self, data: CartItemAddedData) {
        self.id = Some(data.item_id);
        self.client_id = Some(data.client_id);
        self.provider_id = Some(data.provider_id);
        self.service_id = Some(data.service_id);
        self.service_name = data.service_name;
        self.service_description = data.service_description;
        self.category = data.category;
        self.charging = data.charging;
        self.unit_price = data.unit_price;
        self.quantity = data.quantity;
        self.notes = data.notes;
        self.added_at = Some(data.added_at);
        self.status = CartItemStatus::Active;
    }
}
