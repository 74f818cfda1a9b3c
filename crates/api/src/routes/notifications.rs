//! Unread counter for UI polling.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::UnreadCount;
use event_store::EventStore;
use serde::Serialize;

use super::parse_aggregate_id;
use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UnreadResponse {
    #[serde(flatten)]
    pub counts: UnreadCount,
    pub total: u64,
}

/// GET /notifications/unread: safe to poll; recomputed on every call.
#[tracing::instrument(skip(state))]
pub async fn unread<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<UnreadResponse>, ApiError> {
    let counts = state.notifications.unread_count(actor.id).await?;
    Ok(Json(UnreadResponse {
        total: counts.total(),
        counts,
    }))
}

/// POST /notifications/bookings/:id/ack: mark the booking as seen.
#[tracing::instrument(skip(state))]
pub async fn acknowledge<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let booking_id = parse_aggregate_id(&id)?;
    state.notifications.acknowledge(&actor, booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
