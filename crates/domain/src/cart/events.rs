//! Cart item domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::ChargingSelection;
use crate::value_objects::{Money, Quantity, ServiceId};

/// Events that can occur on a cart item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartItemEvent {
    /// A priced service was put in a client's cart.
    CartItemAdded(CartItemAddedData),

    /// The quantity controls changed the item.
    QuantityChanged(QuantityChangedData),

    /// The client took the item out of the cart.
    CartItemRemoved(CartItemRemovedData),

    /// The item was converted into a booking.
    CartItemCheckedOut(CartItemCheckedOutData),
}

impl DomainEvent for CartItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartItemEvent::CartItemAdded(_) => "CartItemAdded",
            CartItemEvent::QuantityChanged(_) => "QuantityChanged",
            CartItemEvent::CartItemRemoved(_) => "CartItemRemoved",
            CartItemEvent::CartItemCheckedOut(_) => "CartItemCheckedOut",
        }
    }
}

/// Data for CartItemAdded event.
///
/// Everything needed to book the item later is captured here, so checkout
/// never consults the live catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemAddedData {
    pub item_id: AggregateId,
    pub client_id: UserId,
    pub provider_id: UserId,
    pub service_id: ServiceId,
    pub service_name: String,
    pub service_description: String,
    pub category: String,

    /// None when the service's flat price applied.
    pub charging: Option<ChargingSelection>,

    /// Resolved price at the moment of adding.
    pub unit_price: Money,
    pub quantity: Quantity,
    pub notes: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Data for QuantityChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityChangedData {
    pub old_quantity: Quantity,
    pub new_quantity: Quantity,
    pub changed_at: DateTime<Utc>,
}

/// Data for CartItemRemoved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRemovedData {
    pub removed_at: DateTime<Utc>,
}

/// Data for CartItemCheckedOut event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemCheckedOutData {
    pub booking_id: AggregateId,
    pub checked_out_at: DateTime<Utc>,
}

// Convenience constructors
impl CartItemEvent {
    pub fn quantity_changed(old_quantity: Quantity, new_quantity: Quantity) -> Self {
        CartItemEvent::QuantityChanged(QuantityChangedData {
            old_quantity,
            new_quantity,
            changed_at: Utc::now(),
        })
    }

    pub fn removed() -> Self {
        CartItemEvent::CartItemRemoved(CartItemRemovedData {
            removed_at: Utc::now(),
        })
    }

    pub fn checked_out(booking_id: AggregateId) -> Self {
        CartItemEvent::CartItemCheckedOut(CartItemCheckedOutData {
            booking_id,
            checked_out_at: Utc::now(),
        })
    }
}
