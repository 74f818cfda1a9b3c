//! Quote request domain events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, ServiceId};

/// Events that can occur on a quote request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum QuoteEvent {
    /// A client asked a provider to price a job.
    QuoteRequested(QuoteRequestedData),

    /// The provider answered with a price.
    QuoteSubmitted(QuoteSubmittedData),

    /// The client took the price; a booking was created from it.
    QuoteAccepted(QuoteAcceptedData),

    /// Either side closed the request without a booking.
    QuoteDeclined(QuoteDeclinedData),
}

impl DomainEvent for QuoteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuoteEvent::QuoteRequested(_) => "QuoteRequested",
            QuoteEvent::QuoteSubmitted(_) => "QuoteSubmitted",
            QuoteEvent::QuoteAccepted(_) => "QuoteAccepted",
            QuoteEvent::QuoteDeclined(_) => "QuoteDeclined",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequestedData {
    pub quote_id: AggregateId,
    pub client_id: UserId,
    pub provider_id: UserId,
    pub service_id: ServiceId,
    pub service_name: String,
    pub service_description: String,
    pub category: String,
    pub details: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSubmittedData {
    pub price: Money,
    pub message: Option<String>,
    pub actor: Actor,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteAcceptedData {
    pub booking_id: AggregateId,
    pub actor: Actor,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteDeclinedData {
    pub actor: Actor,
    pub reason: Option<String>,
    pub declined_at: DateTime<Utc>,
}

impl QuoteEvent {
    pub fn submitted(price: Money, message: Option<String>, actor: Actor) -> Self {
        QuoteEvent::QuoteSubmitted(QuoteSubmittedData {
            price,
            message,
            actor,
            submitted_at: Utc::now(),
        })
    }

    pub fn accepted(booking_id: AggregateId, actor: Actor) -> Self {
        QuoteEvent::QuoteAccepted(QuoteAcceptedData {
            booking_id,
            actor,
            accepted_at: Utc::now(),
        })
    }

    pub fn declined(actor: Actor, reason: Option<String>) -> Self {
        QuoteEvent::QuoteDeclined(QuoteDeclinedData {
            actor,
            reason,
            declined_at: Utc::now(),
        })
    }
}
