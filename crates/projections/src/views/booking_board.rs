//! Booking board read model: each user's bookings grouped by status, plus
//! provider earnings, for the client, provider and admin dashboards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::booking::{BookingEvent, BookingSource};
use domain::earnings::EarningEvent;
use domain::{BookingStatus, Money, ServiceId};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One booking as it appears on a dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct BookingCard {
    pub booking_id: AggregateId,
    pub client_id: UserId,
    pub provider_id: UserId,
    pub service_id: ServiceId,
    pub service_name: String,
    pub source: BookingSource,
    pub status: BookingStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's bookings in one status, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: BookingStatus,
    pub bookings: Vec<BookingCard>,
}

/// A user's whole board. Columns follow the lifecycle order and are present
/// even when empty.
#[derive(Debug, Clone, Serialize)]
pub struct BookingBoard {
    pub user_id: UserId,
    pub columns: Vec<BoardColumn>,
}

impl BookingBoard {
    pub fn column(&self, status: BookingStatus) -> &[BookingCard] {
        self.columns
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.bookings.as_slice())
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.bookings.len()).sum()
    }
}

#[derive(Default)]
struct BookingBoardState {
    bookings: HashMap<AggregateId, BookingCard>,
    earnings: HashMap<UserId, Money>,
    position: ProjectionPosition,
}

/// Read model view over Booking and ProviderEarning streams.
#[derive(Clone, Default)]
pub struct BookingBoardView {
    state: Arc<RwLock<BookingBoardState>>,
}

impl BookingBoardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, booking_id: AggregateId) -> Option<BookingCard> {
        self.state.read().await.bookings.get(&booking_id).cloned()
    }

    /// The board of everything `user` is a party to.
    pub async fn board_for(&self, user: UserId) -> BookingBoard {
        let state = self.state.read().await;
        let mine: Vec<_> = state
            .bookings
            .values()
            .filter(|card| card.client_id == user || card.provider_id == user)
            .collect();

        let columns = BookingStatus::ALL
            .iter()
            .map(|&status| BoardColumn {
                status,
                bookings: newest_first(mine.iter().copied().filter(|c| c.status == status)),
            })
            .collect();

        BookingBoard {
            user_id: user,
            columns,
        }
    }

    /// Every booking in `status`, across all users. Backs the admin dashboard.
    pub async fn by_status(&self, status: BookingStatus) -> Vec<BookingCard> {
        let state = self.state.read().await;
        newest_first(state.bookings.values().filter(|c| c.status == status))
    }

    /// Sum of recorded earnings for a provider.
    pub async fn earnings_for(&self, provider: UserId) -> Money {
        self.state
            .read()
            .await
            .earnings
            .get(&provider)
            .copied()
            .unwrap_or_default()
    }

    fn apply_booking(state: &mut BookingBoardState, event: &EventEnvelope) -> Result<()> {
        let booking_event: BookingEvent = serde_json::from_value(event.payload.clone())?;

        match booking_event {
            BookingEvent::BookingCreated(data) => {
                state.bookings.insert(
                    data.booking_id,
                    BookingCard {
                        booking_id: data.booking_id,
                        client_id: data.client_id,
                        provider_id: data.provider_id,
                        service_id: data.snapshot.service_id,
                        service_name: data.snapshot.service_name.clone(),
                        source: data.source,
                        status: BookingStatus::Pending,
                        total: data.snapshot.total(),
                        created_at: data.created_at,
                        updated_at: data.created_at,
                    },
                );
            }
            BookingEvent::StatusChanged(data) => {
                if let Some(card) = state.bookings.get_mut(&event.aggregate_id) {
                    card.status = data.to;
                    card.updated_at = data.changed_at;
                } else {
                    tracing::warn!(
                        booking_id = %event.aggregate_id,
                        "status change for a booking the board has not seen"
                    );
                }
            }
        }
        Ok(())
    }

    fn apply_earning(state: &mut BookingBoardState, event: &EventEnvelope) -> Result<()> {
        let earning: EarningEvent = serde_json::from_value(event.payload.clone())?;
        let EarningEvent::EarningRecorded(data) = earning;
        *state.earnings.entry(data.provider_id).or_default() += data.amount;
        Ok(())
    }
}

fn newest_first<'a>(cards: impl Iterator<Item = &'a BookingCard>) -> Vec<BookingCard> {
    let mut cards: Vec<_> = cards.cloned().collect();
    cards.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    cards
}

#[async_trait]
impl Projection for BookingBoardView {
    fn name(&self) -> &'static str {
        "BookingBoardView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        match event.aggregate_type.as_str() {
            "Booking" => Self::apply_booking(&mut state, event)?,
            "ProviderEarning" => Self::apply_earning(&mut state, event)?,
            _ => {}
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = BookingBoardState::default();
        Ok(())
    }
}

impl ReadModel for BookingBoardView {
    fn name(&self) -> &'static str {
        "BookingBoardView"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.bookings.len())
            .unwrap_or(0)
    }
}
