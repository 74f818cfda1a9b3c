//! Provider earnings, recorded when a booking completes.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::{Tag, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::booking::Booking;
use crate::catalog::CatalogEntity;
use crate::error::DomainError;
use crate::value_objects::{ChargingTypeId, Money, ServiceId};

/// Events on a provider earning stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EarningEvent {
    EarningRecorded(EarningRecordedData),
}

impl DomainEvent for EarningEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EarningEvent::EarningRecorded(_) => "EarningRecorded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningRecordedData {
    pub earning_id: AggregateId,
    pub provider_id: UserId,
    pub booking_id: AggregateId,
    pub service_id: ServiceId,
    pub charging_type_id: Option<ChargingTypeId>,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

/// The booking total attributed to the provider who did the job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderEarning {
    id: Option<AggregateId>,
    #[serde(default)]
    version: Version,
    provider_id: Option<UserId>,
    booking_id: Option<AggregateId>,
    service_id: Option<ServiceId>,
    charging_type_id: Option<ChargingTypeId>,
    amount: Money,
    recorded_at: Option<DateTime<Utc>>,
}

impl Aggregate for ProviderEarning {
    type Event = EarningEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "ProviderEarning"
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
            EarningEvent::EarningRecorded(data) => {
                self.id = Some(data.earning_id);
                self.provider_id = Some(data.provider_id);
                self.booking_id = Some(data.booking_id);
                self.service_id = Some(data.service_id);
                self.charging_type_id = data.charging_type_id;
                self.amount = data.amount;
                self.recorded_at = Some(data.recorded_at);
            }
        }
    }

    fn tags(&self) -> Vec<Tag> {
        let mut tags = Vec::new();
        if let Some(provider_id) = self.provider_id {
            tags.push(Tag::new("provider", provider_id));
        }
        if let Some(service_id) = self.service_id {
            tags.push(CatalogEntity::Service(service_id).tag());
        }
        if let Some(charging_type_id) = self.charging_type_id {
            tags.push(CatalogEntity::ChargingType(charging_type_id).tag());
        }
        tags
    }
}

impl ProviderEarning {
    pub fn provider_id(&self) -> Option<UserId> {
        self.provider_id
    }

    pub fn booking_id(&self) -> Option<AggregateId> {
        self.booking_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.recorded_at
    }

    /// Records the earning for a booking that is completing.
    pub fn record(
        &self,
        earning_id: AggregateId,
        booking: &Booking,
    ) -> Result<Vec<EarningEvent>, DomainError> {
        if self.id.is_some() {
            return Err(DomainError::Validation(format!(
                "earning {earning_id} already recorded"
            )));
        }

        let booking_id = booking
            .id()
            .ok_or_else(|| DomainError::not_found("booking", ""))?;
        let (Some(provider_id), Some(snapshot)) = (booking.provider_id(), booking.snapshot())
        else {
            return Err(DomainError::not_found("booking", booking_id));
        };

        let amount = snapshot
            .unit_price
            .checked_multiply(snapshot.quantity.get())
            .ok_or_else(|| {
                DomainError::Validation(format!("booking {booking_id} total is out of range"))
            })?;

        Ok(vec![EarningEvent::EarningRecorded(EarningRecordedData {
            earning_id,
            provider_id,
            booking_id,
            service_id: snapshot.service_id,
            charging_type_id: snapshot.charging.map(|c| c.charging_type_id),
            amount,
            recorded_at: Utc::now(),
        })])
    }
}
