//! Per-user record of which booking versions have been seen.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboxEvent {
    BookingAcknowledged(BookingAcknowledgedData),
}

impl DomainEvent for InboxEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InboxEvent::BookingAcknowledged(_) => "BookingAcknowledged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingAcknowledgedData {
    pub user_id: UserId,
    pub booking_id: AggregateId,
    /// Booking version the user has seen up to.
    pub version: Version,
    pub acknowledged_at: DateTime<Utc>,
}

/// One stream per user, keyed by the user's uuid.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    id: Option<AggregateId>,
    version: Version,
    seen: HashMap<AggregateId, Version>,
}

impl Aggregate for Inbox {
    type Event = InboxEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "Inbox"
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
            InboxEvent::BookingAcknowledged(data) => {
                self.id = Some(Self::stream_id(data.user_id));
                let seen = self.seen.entry(data.booking_id).or_default();
                *seen = (*seen).max(data.version);
            }
        }
    }
}

impl Inbox {
    pub fn stream_id(user: UserId) -> AggregateId {
        AggregateId::from_uuid(user.as_uuid())
    }

    /// Latest version of `booking` the user has acknowledged.
    pub fn seen_version(&self, booking: AggregateId) -> Version {
        self.seen.get(&booking).copied().unwrap_or_default()
    }

    /// Records that `user` has seen `booking` up to `version`. Seeing an
    /// already acknowledged version again records nothing.
    pub fn acknowledge(
        &self,
        user: UserId,
        booking: AggregateId,
        version: Version,
    ) -> Result<Vec<InboxEvent>, DomainError> {
        if self.seen_version(booking) >= version {
            return Ok(vec![]);
        }
        Ok(vec![InboxEvent::BookingAcknowledged(BookingAcknowledgedData {
            user_id: user,
            booking_id: booking,
            version,
            acknowledged_at: Utc::now(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acknowledging_is_idempotent() {
        let user = UserId::new();
        let booking = AggregateId::new();
        let mut inbox = Inbox::default();

        let events = inbox.acknowledge(user, booking, Version::new(2)).unwrap();
        inbox.apply_events(events);

        assert_eq!(inbox.seen_version(booking), Version::new(2));
        assert!(inbox.acknowledge(user, booking, Version::new(2)).unwrap().is_empty());
        assert!(inbox.acknowledge(user, booking, Version::first()).unwrap().is_empty());
        assert_eq!(inbox.id(), Some(Inbox::stream_id(user)));
    }
}
