//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{AddCartItem, Booking, CartItem};
use event_store::EventStore;
use serde::Deserialize;

use super::{parse_aggregate_id, parse_user_id};
use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    /// Whose cart to list; defaults to the caller's own.
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

/// GET /cart: active items in a client's cart, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<CartQuery>,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    let client_id = match query.client_id.as_deref() {
        Some(id) => parse_user_id(id)?,
        None => actor.id,
    };
    Ok(Json(state.cart.list_items(&actor, client_id).await?))
}

/// POST /cart: add a service to the caller's cart.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<AddCartItem>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let result = state.cart.add_item(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(result.aggregate)))
}

/// PATCH /cart/:id: change quantity; out-of-range values are clamped.
#[tracing::instrument(skip(state))]
pub async fn set_quantity<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CartItem>, ApiError> {
    let item_id = parse_aggregate_id(&id)?;
    let result = state
        .cart
        .set_quantity(&actor, item_id, req.quantity)
        .await?;
    Ok(Json(result.aggregate))
}

/// DELETE /cart/:id
#[tracing::instrument(skip(state))]
pub async fn remove<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id = parse_aggregate_id(&id)?;
    state.cart.remove_item(&actor, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/:id/checkout: turn a cart item into a pending booking.
#[tracing::instrument(skip(state))]
pub async fn checkout<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let item_id = parse_aggregate_id(&id)?;
    let result = state.bookings.checkout(&actor, item_id).await?;
    Ok((StatusCode::CREATED, Json(result.aggregate)))
}
