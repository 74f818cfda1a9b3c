//! Quote request aggregate.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, UserId};
use event_store::{Tag, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::booking::party_tag;
use crate::catalog::CatalogEntity;
use crate::error::DomainError;
use crate::value_objects::{Money, ServiceId};

use super::{QuoteEvent, events::QuoteRequestedData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    /// Waiting for the provider's price.
    #[default]
    Pending,
    /// Priced, waiting for the client.
    Quoted,
    Accepted,
    Declined,
}

impl QuoteStatus {
    /// Open requests still count as dependents of their service.
    pub fn is_open(&self) -> bool {
        matches!(self, QuoteStatus::Pending | QuoteStatus::Quoted)
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Quoted => "quoted",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Declined => "declined",
        };
        f.write_str(s)
    }
}

/// A client's request for a provider to price a quote-only job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteRequest {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    client_id: Option<UserId>,
    provider_id: Option<UserId>,
    service_id: Option<ServiceId>,
    service_name: String,
    service_description: String,
    category: String,
    details: String,
    status: QuoteStatus,
    quoted_price: Option<Money>,
    provider_message: Option<String>,
    booking_id: Option<AggregateId>,
    requested_at: Option<DateTime<Utc>>,
}

impl Aggregate for QuoteRequest {
    type Event = QuoteEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "QuoteRequest"
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
            QuoteEvent::QuoteRequested(data) => {
                self.id = Some(data.quote_id);
                self.client_id = Some(data.client_id);
                self.provider_id = Some(data.provider_id);
                self.service_id = Some(data.service_id);
                self.service_name = data.service_name;
                self.service_description = data.service_description;
                self.category = data.category;
                self.details = data.details;
                self.requested_at = Some(data.requested_at);
                self.status = QuoteStatus::Pending;
            }
            QuoteEvent::QuoteSubmitted(data) => {
                self.quoted_price = Some(data.price);
                self.provider_message = data.message;
                self.status = QuoteStatus::Quoted;
            }
            QuoteEvent::QuoteAccepted(data) => {
                self.booking_id = Some(data.booking_id);
                self.status = QuoteStatus::Accepted;
            }
            QuoteEvent::QuoteDeclined(_) => self.status = QuoteStatus::Declined,
        }
    }

    fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = [self.client_id, self.provider_id]
            .into_iter()
            .flatten()
            .map(party_tag)
            .collect();
        if let Some(service_id) = self.service_id {
            tags.push(CatalogEntity::Service(service_id).tag());
        }
        tags
    }
}

impl QuoteRequest {
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

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn status(&self) -> QuoteStatus {
        self.status
    }

    pub fn quoted_price(&self) -> Option<Money> {
        self.quoted_price
    }

    pub fn booking_id(&self) -> Option<AggregateId> {
        self.booking_id
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        actor.is_admin()
            || (actor.is_client() && self.client_id == Some(actor.id))
            || (actor.is_provider() && self.provider_id == Some(actor.id))
    }
}

// Command methods (return events)
impl QuoteRequest {
    pub fn request(&self, data: QuoteRequestedData) -> Result<Vec<QuoteEvent>, DomainError> {
        if self.id.is_some() {
            return Err(DomainError::Validation(format!(
                "quote request {} already exists",
                data.quote_id
            )));
        }
        if data.client_id == data.provider_id {
            return Err(DomainError::Validation(
                "providers cannot request quotes for their own services".into(),
            ));
        }
        Ok(vec![QuoteEvent::QuoteRequested(data)])
    }

    /// The provider prices the job. The price must be positive and no larger
    /// than [`Money::MAX_PRICE`].
    pub fn submit(
        &self,
        actor: &Actor,
        price: Money,
        message: Option<String>,
    ) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_exists()?;
        if !(actor.is_provider() && self.provider_id == Some(actor.id)) {
            return Err(DomainError::unauthorized(
                "only the service's provider can price this request",
            ));
        }
        self.ensure_status(QuoteStatus::Pending)?;
        if !price.is_valid_price() {
            return Err(DomainError::Validation(format!(
                "quoted price must be between 0.01 and {}, got {price}",
                Money::MAX_PRICE
            )));
        }
        Ok(vec![QuoteEvent::submitted(price, message, *actor)])
    }

    /// The client takes the quoted price.
    pub fn accept(
        &self,
        actor: &Actor,
        booking_id: AggregateId,
    ) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_client(actor)?;
        self.ensure_status(QuoteStatus::Quoted)?;
        Ok(vec![QuoteEvent::accepted(booking_id, *actor)])
    }

    /// Closes the request: the provider may turn down a pending one, the
    /// client may turn down a price. Admins may close either.
    pub fn decline(
        &self,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_exists()?;
        if !self.status.is_open() {
            return Err(self.wrong_status());
        }

        let allowed = actor.is_admin()
            || match self.status {
                QuoteStatus::Pending => {
                    actor.is_provider() && self.provider_id == Some(actor.id)
                }
                _ => actor.is_client() && self.client_id == Some(actor.id),
            };
        if !allowed {
            return Err(DomainError::unauthorized(format!(
                "a {} may not decline a {} quote request",
                actor.role, self.status
            )));
        }
        Ok(vec![QuoteEvent::declined(*actor, reason)])
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        match self.id {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("quote request", "")),
        }
    }

    fn ensure_client(&self, actor: &Actor) -> Result<(), DomainError> {
        if actor.is_client() && self.client_id == Some(actor.id) {
            Ok(())
        } else {
            Err(DomainError::unauthorized(
                "only the requesting client can do this",
            ))
        }
    }

    fn ensure_status(&self, expected: QuoteStatus) -> Result<(), DomainError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.wrong_status())
        }
    }

    fn wrong_status(&self) -> DomainError {
        DomainError::Validation(format!("quote request is {}", self.status))
    }
}
