//! Booking aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, Role, UserId};
use event_store::{Tag, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::CatalogEntity;
use crate::error::DomainError;

use super::{
    BookingEvent, BookingSource, BookingStatus, ServiceSnapshot,
    events::{BookingCreatedData, StatusChangedData},
};

/// One entry of a booking's append-only status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: BookingStatus,
    pub actor: Actor,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Booking aggregate root.
///
/// Created pending from a cart item or an accepted quote, then moved along
/// the transition table by the parties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Booking {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    client_id: Option<UserId>,
    provider_id: Option<UserId>,
    source: Option<BookingSource>,
    snapshot: Option<ServiceSnapshot>,
    status: BookingStatus,

    /// Includes the initial pending entry.
    status_history: Vec<StatusEntry>,

    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Booking {
    type Event = BookingEvent;
    type Error = DomainError;

    fn aggregate_type() -> &'static str {
        "Booking"
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
            BookingEvent::BookingCreated(data) => self.apply_created(data),
            BookingEvent::StatusChanged(data) => self.apply_status_changed(data),
        }
    }

    fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = [self.client_id, self.provider_id]
            .into_iter()
            .flatten()
            .map(party_tag)
            .collect();
        if let Some(snapshot) = &self.snapshot {
            tags.push(CatalogEntity::Service(snapshot.service_id).tag());
            if let Some(charging) = snapshot.charging {
                tags.push(CatalogEntity::ChargingType(charging.charging_type_id).tag());
            }
        }
        tags
    }
}

/// Tag carried by every booking and quote a user takes part in.
pub fn party_tag(user_id: UserId) -> Tag {
    Tag::new("party", user_id)
}

// Query methods
impl Booking {
    pub fn client_id(&self) -> Option<UserId> {
        self.client_id
    }

    pub fn provider_id(&self) -> Option<UserId> {
        self.provider_id
    }

    pub fn source(&self) -> Option<BookingSource> {
        self.source
    }

    pub fn snapshot(&self) -> Option<&ServiceSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn status_history(&self) -> &[StatusEntry] {
        &self.status_history
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// The entry that put the booking in its current status.
    pub fn latest_entry(&self) -> Option<&StatusEntry> {
        self.status_history.last()
    }

    /// Returns true if `user` is the booking's client or provider.
    pub fn is_party(&self, user: UserId) -> bool {
        self.client_id == Some(user) || self.provider_id == Some(user)
    }

    /// Parties see their own bookings; admins see everything.
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        actor.is_admin() || self.acts_as_party(actor)
    }

    /// The actor holds the party slot matching their role.
    fn acts_as_party(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Client => self.client_id == Some(actor.id),
            Role::Provider => self.provider_id == Some(actor.id),
            Role::Admin => false,
        }
    }
}

// Command methods (return events)
impl Booking {
    /// Opens the booking in `pending`.
    pub fn create(&self, data: BookingCreatedData) -> Result<Vec<BookingEvent>, DomainError> {
        if self.id.is_some() {
            return Err(DomainError::Validation(format!(
                "booking {} already exists",
                data.booking_id
            )));
        }
        Ok(vec![BookingEvent::BookingCreated(data)])
    }

    /// Moves the booking to `to` on behalf of `actor`.
    ///
    /// The pair must be in the transition table, the actor's role must be
    /// allowed for it, and a client or provider must be the booking's own.
    /// A cancellation without a reason is recorded as "cancelled by {role}".
    pub fn transition(
        &self,
        actor: &Actor,
        to: BookingStatus,
        reason: Option<String>,
    ) -> Result<Vec<BookingEvent>, DomainError> {
        let Some(id) = self.id else {
            return Err(DomainError::not_found("booking", ""));
        };

        let from = self.status;
        let roles = from
            .allowed_roles(to)
            .ok_or(DomainError::IllegalTransition { from, to })?;

        if !roles.contains(&actor.role) {
            return Err(DomainError::unauthorized(format!(
                "a {} may not move a booking from {from} to {to}",
                actor.role
            )));
        }
        if !actor.is_admin() && !self.acts_as_party(actor) {
            return Err(DomainError::unauthorized(format!(
                "{actor} is not a party to booking {id}"
            )));
        }

        // A cancellation always says why in the history
        let reason = reason.filter(|r| !r.trim().is_empty());
        let reason = match (to, reason) {
            (BookingStatus::Cancelled, None) => Some(format!("cancelled by {}", actor.role)),
            (_, reason) => reason,
        };

        Ok(vec![BookingEvent::status_changed(from, to, *actor, reason)])
    }
}

// Apply event helpers
impl Booking {
    fn apply_created(&mut self, data: BookingCreatedData) {
        self.id = Some(data.booking_id);
        self.client_id = Some(data.client_id);
        self.provider_id = Some(data.provider_id);
        self.source = Some(data.source);
        self.snapshot = Some(data.snapshot);
        self.status = BookingStatus::Pending;
        self.created_at = Some(data.created_at);
        self.status_history.push(StatusEntry {
            status: BookingStatus::Pending,
            actor: data.actor,
            at: data.created_at,
            reason: None,
        });
    }

    fn apply_status_changed(&mut self, data: StatusChangedData) {
        self.status = data.to;
        self.status_history.push(StatusEntry {
            status: data.to,
            actor: data.actor,
            at: data.changed_at,
            reason: data.reason,
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{ChargingKind, ChargingSelection};
    use crate::error::ErrorKind;
    use crate::value_objects::{ChargingTypeId, Money, Quantity, ServiceId};

    pub(crate) fn created_data(client_id: UserId, provider_id: UserId) -> BookingCreatedData {
        BookingCreatedData {
            booking_id: AggregateId::new(),
            client_id,
            provider_id,
            source: BookingSource::CartItem(AggregateId::new()),
            snapshot: ServiceSnapshot {
                service_id: ServiceId::new(),
                service_name: "Desentupimento de Pia".to_string(),
                description: String::new(),
                category: "Hidráulica".to_string(),
                charging: Some(ChargingSelection {
                    charging_type_id: ChargingTypeId::new(),
                    kind: ChargingKind::PerVisit,
                }),
                unit_price: Money::from_cents(8000),
                quantity: Quantity::clamped(2),
                notes: None,
            },
            actor: Actor::client(client_id),
            created_at: Utc::now(),
        }
    }

    struct Parties {
        client: Actor,
        provider: Actor,
        booking: Booking,
    }

    fn pending() -> Parties {
        let client = Actor::client(UserId::new());
        let provider = Actor::provider(UserId::new());
        let mut booking = Booking::default();
        let events = booking
            .create(created_data(client.id, provider.id))
            .unwrap();
        booking.apply_events(events);
        Parties {
            client,
            provider,
            booking,
        }
    }

    fn step(booking: &mut Booking, actor: &Actor, to: BookingStatus) {
        let events = booking.transition(actor, to, None).unwrap();
        booking.apply_events(events);
    }

    #[test]
    fn created_booking_is_pending_with_history() {
        let p = pending();
        assert_eq!(p.booking.status(), BookingStatus::Pending);
        assert_eq!(p.booking.status_history().len(), 1);
        assert_eq!(p.booking.latest_entry().unwrap().actor, p.client);
        assert_eq!(p.booking.snapshot().unwrap().total(), Money::from_cents(16000));
    }

    #[test]
    fn provider_walks_the_happy_path() {
        let mut p = pending();
        step(&mut p.booking, &p.provider, BookingStatus::Accepted);
        step(&mut p.booking, &p.provider, BookingStatus::Ongoing);
        step(&mut p.booking, &p.provider, BookingStatus::Completed);

        let statuses: Vec<_> = p
            .booking
            .status_history()
            .iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                BookingStatus::Pending,
                BookingStatus::Accepted,
                BookingStatus::Ongoing,
                BookingStatus::Completed
            ]
        );
    }

    #[test]
    fn provider_cannot_complete_directly() {
        let mut p = pending();
        step(&mut p.booking, &p.provider, BookingStatus::Accepted);

        let err = p
            .booking
            .transition(&p.provider, BookingStatus::Completed, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn client_cannot_accept() {
        let p = pending();
        let err = p
            .booking
            .transition(&p.client, BookingStatus::Accepted, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn outsiders_cannot_cancel_but_admins_can() {
        let p = pending();
        let stranger = Actor::provider(UserId::new());

        let err = p
            .booking
            .transition(&stranger, BookingStatus::Cancelled, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let events = p
            .booking
            .transition(
                &Actor::admin(UserId::new()),
                BookingStatus::Cancelled,
                Some("duplicate".into()),
            )
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn cancel_keeps_reason_in_history() {
        let mut p = pending();
        let events = p
            .booking
            .transition(&p.client, BookingStatus::Cancelled, Some("mudei de ideia".into()))
            .unwrap();
        p.booking.apply_events(events);

        assert_eq!(p.booking.status(), BookingStatus::Cancelled);
        assert_eq!(
            p.booking.latest_entry().unwrap().reason.as_deref(),
            Some("mudei de ideia")
        );
    }

    #[test]
    fn cancel_without_reason_records_who_cancelled() {
        let mut p = pending();
        step(&mut p.booking, &p.provider, BookingStatus::Cancelled);
        assert_eq!(
            p.booking.latest_entry().unwrap().reason.as_deref(),
            Some("cancelled by provider")
        );

        let mut p = pending();
        let events = p
            .booking
            .transition(&p.client, BookingStatus::Cancelled, Some("  ".into()))
            .unwrap();
        p.booking.apply_events(events);
        assert_eq!(
            p.booking.latest_entry().unwrap().reason.as_deref(),
            Some("cancelled by client")
        );
    }

    #[test]
    fn cancelled_booking_cannot_move() {
        let mut p = pending();
        step(&mut p.booking, &p.client, BookingStatus::Cancelled);

        for to in BookingStatus::ALL {
            let err = p.booking.transition(&p.provider, to, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::IllegalTransition);
        }
    }

    #[test]
    fn transition_on_missing_booking_is_not_found() {
        let err = Booking::default()
            .transition(&Actor::admin(UserId::new()), BookingStatus::Cancelled, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn tags_cover_parties_and_catalog() {
        let p = pending();
        let tags = p.booking.tags();
        assert!(tags.contains(&party_tag(p.client.id)));
        assert!(tags.contains(&party_tag(p.provider.id)));
        assert_eq!(tags.len(), 4);
    }
}
