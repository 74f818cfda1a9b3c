//! Booking lifecycle and dashboard endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{Actor, UserId};
use domain::{Booking, BookingStatus, DomainError, Money};
use event_store::EventStore;
use projections::{BookingBoard, BookingCard};
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_user_id};
use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PartyQuery {
    /// Whose bookings to show; defaults to the caller.
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub to: BookingStatus,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub board: BookingBoard,
    pub earnings: Money,
}

pub(crate) fn target_user(actor: &Actor, query: &PartyQuery) -> Result<UserId, ApiError> {
    query
        .user_id
        .as_deref()
        .map(parse_user_id)
        .transpose()
        .map(|user| user.unwrap_or(actor.id))
}

/// GET /bookings: bookings the user is a party to, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<PartyQuery>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let user = target_user(&actor, &query)?;
    Ok(Json(state.bookings.list_for_party(&actor, user).await?))
}

/// GET /bookings/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking_id = parse_aggregate_id(&id)?;
    Ok(Json(state.bookings.get_booking(&actor, booking_id).await?))
}

/// POST /bookings/:id/transition: move a booking along its lifecycle.
#[tracing::instrument(skip(state))]
pub async fn transition<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Booking>, ApiError> {
    let booking_id = parse_aggregate_id(&id)?;
    let result = state
        .bookings
        .transition(&actor, booking_id, req.to, req.reason)
        .await?;
    Ok(Json(result.aggregate))
}

/// GET /dashboard: the caller's bookings grouped by status, plus earnings.
///
/// Admins may pass `user_id` to see anyone's board.
#[tracing::instrument(skip(state))]
pub async fn dashboard<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<PartyQuery>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let user = target_user(&actor, &query)?;
    if user != actor.id && !actor.is_admin() {
        return Err(
            DomainError::unauthorized("only admins can view another user's dashboard").into(),
        );
    }

    state.projection_processor.run_catch_up().await?;

    Ok(Json(DashboardResponse {
        board: state.board.board_for(user).await,
        earnings: state.board.earnings_for(user).await,
    }))
}

/// GET /admin/bookings?status=...: every booking in one status.
#[tracing::instrument(skip(state))]
pub async fn by_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<BookingCard>>, ApiError> {
    if !actor.is_admin() {
        return Err(DomainError::unauthorized("admin dashboard is for admins").into());
    }

    state.projection_processor.run_catch_up().await?;
    Ok(Json(state.board.by_status(query.status).await))
}
