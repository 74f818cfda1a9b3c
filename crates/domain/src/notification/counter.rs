//! Unread/pending counter for UI polling.

use std::sync::Arc;

use common::{Actor, AggregateId, UserId};
use event_store::{EventQuery, EventStore};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::booking::{Booking, party_tag};
use crate::cache::{CacheInvalidator, CacheKey};
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{ChatService, Inbox};

/// What a user has not looked at yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Bookings someone else changed since the user last acknowledged them.
    pub bookings: u64,
    /// Unread chat messages, as reported by the chat collaborator.
    pub messages: u64,
}

impl UnreadCount {
    pub fn total(&self) -> u64 {
        self.bookings + self.messages
    }
}

/// Derives [`UnreadCount`] from the store on every call; holds no counters
/// of its own, so repeated polls cannot drift.
pub struct NotificationCounter<S: EventStore + Clone> {
    bookings: CommandHandler<S, Booking>,
    inbox: CommandHandler<S, Inbox>,
    chat: Arc<dyn ChatService>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl<S: EventStore + Clone> NotificationCounter<S> {
    pub fn new(
        store: S,
        chat: Arc<dyn ChatService>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            bookings: CommandHandler::new(store.clone()),
            inbox: CommandHandler::new(store),
            chat,
            invalidator,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn unread_count(&self, user: UserId) -> Result<UnreadCount, DomainError> {
        let inbox = self.inbox.load(Inbox::stream_id(user)).await?;

        let query = EventQuery::tagged(Booking::aggregate_type(), party_tag(user));
        let events = self.bookings.store().query_events(query).await?;
        let bookings = CommandHandler::<S, Booking>::replay_streams(events)?
            .iter()
            .filter(|booking| is_unread(booking, user, &inbox))
            .count() as u64;

        let messages = self.chat.unread_messages(user).await?;
        Ok(UnreadCount { bookings, messages })
    }

    /// Marks the booking's current version as seen by the actor.
    #[tracing::instrument(skip(self))]
    pub async fn acknowledge(
        &self,
        actor: &Actor,
        booking_id: AggregateId,
    ) -> Result<CommandResult<Inbox>, DomainError> {
        let booking = self
            .bookings
            .load_existing(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("booking", booking_id))?;
        if !booking.is_party(actor.id) {
            return Err(DomainError::unauthorized(format!(
                "{actor} is not a party to booking {booking_id}"
            )));
        }

        let version = booking.version();
        let result = self
            .inbox
            .execute(Inbox::stream_id(actor.id), |inbox| {
                inbox.acknowledge(actor.id, booking_id, version)
            })
            .await?;

        if !result.events.is_empty() {
            self.invalidator.invalidate(CacheKey::UnreadCount(actor.id));
        }
        Ok(result)
    }
}

fn is_unread(booking: &Booking, user: UserId, inbox: &Inbox) -> bool {
    let Some(id) = booking.id() else {
        return false;
    };
    let changed_by_other = booking
        .latest_entry()
        .is_some_and(|entry| entry.actor.id != user);

    booking.is_party(user) && changed_by_other && booking.version() > inbox.seen_version(id)
}
