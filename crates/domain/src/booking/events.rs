//! Booking domain events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::ChargingSelection;
use crate::value_objects::{Money, Quantity, ServiceId};

use super::BookingStatus;

/// Events that can occur on a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// A booking was opened from a cart item or an accepted quote.
    BookingCreated(BookingCreatedData),

    /// The booking moved to another status.
    StatusChanged(StatusChangedData),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated(_) => "BookingCreated",
            BookingEvent::StatusChanged(_) => "StatusChanged",
        }
    }
}

/// What the booking was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BookingSource {
    CartItem(AggregateId),
    Quote(AggregateId),
}

/// The service as it was when the booking was made. Never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub service_id: ServiceId,
    pub service_name: String,
    pub description: String,
    pub category: String,
    pub charging: Option<ChargingSelection>,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub notes: Option<String>,
}

impl ServiceSnapshot {
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity.get())
    }
}

/// Data for BookingCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCreatedData {
    pub booking_id: AggregateId,
    pub client_id: UserId,
    pub provider_id: UserId,
    pub source: BookingSource,
    pub snapshot: ServiceSnapshot,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

/// Data for StatusChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: Actor,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl BookingEvent {
    pub fn status_changed(
        from: BookingStatus,
        to: BookingStatus,
        actor: Actor,
        reason: Option<String>,
    ) -> Self {
        BookingEvent::StatusChanged(StatusChangedData {
            from,
            to,
            actor,
            reason,
            changed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_serializes_lowercase_states() {
        let event = BookingEvent::status_changed(
            BookingStatus::Pending,
            BookingStatus::Accepted,
            Actor::provider(UserId::new()),
            None,
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "StatusChanged");
        assert_eq!(json["data"]["from"], "pending");
        assert_eq!(json["data"]["to"], "accepted");
    }

    #[test]
    fn source_is_tagged_by_kind() {
        let id = AggregateId::new();
        let json = serde_json::to_value(BookingSource::Quote(id)).unwrap();
        assert_eq!(json["kind"], "quote");
        assert_eq!(json["id"], id.to_string());
    }
}
