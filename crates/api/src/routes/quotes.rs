//! Quote flow endpoints for quote-only services.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{Booking, Money, QuoteRequest, RequestQuote};
use event_store::EventStore;
use serde::Deserialize;

use super::bookings::{PartyQuery, target_user};
use super::parse_aggregate_id;
use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitQuoteRequest {
    /// Price as the catalog writes it: `"150.00"`, `"150,00"` or `"150"`.
    pub price: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeclineQuoteRequest {
    pub reason: Option<String>,
}

/// POST /quotes: ask the service's provider for a price.
#[tracing::instrument(skip(state, req))]
pub async fn request<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<RequestQuote>,
) -> Result<(StatusCode, Json<QuoteRequest>), ApiError> {
    let result = state.quotes.request_quote(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(result.aggregate)))
}

/// GET /quotes: quote requests the user is a party to.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<PartyQuery>,
) -> Result<Json<Vec<QuoteRequest>>, ApiError> {
    let user = target_user(&actor, &query)?;
    Ok(Json(state.quotes.list_for_party(&actor, user).await?))
}

/// GET /quotes/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<QuoteRequest>, ApiError> {
    let quote_id = parse_aggregate_id(&id)?;
    Ok(Json(state.quotes.get_quote(&actor, quote_id).await?))
}

/// POST /quotes/:id/submit: the provider prices the job.
#[tracing::instrument(skip(state))]
pub async fn submit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SubmitQuoteRequest>,
) -> Result<Json<QuoteRequest>, ApiError> {
    let quote_id = parse_aggregate_id(&id)?;
    let price = Money::parse_lenient(&req.price);
    let result = state
        .quotes
        .submit_quote(&actor, quote_id, price, req.message)
        .await?;
    Ok(Json(result.aggregate))
}

/// POST /quotes/:id/accept: the client accepts; opens a pending booking.
#[tracing::instrument(skip(state))]
pub async fn accept<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let quote_id = parse_aggregate_id(&id)?;
    let result = state.quotes.accept_quote(&actor, quote_id).await?;
    Ok((StatusCode::CREATED, Json(result.aggregate)))
}

/// POST /quotes/:id/decline
#[tracing::instrument(skip(state))]
pub async fn decline<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<DeclineQuoteRequest>,
) -> Result<Json<QuoteRequest>, ApiError> {
    let quote_id = parse_aggregate_id(&id)?;
    let result = state
        .quotes
        .decline_quote(&actor, quote_id, req.reason)
        .await?;
    Ok(Json(result.aggregate))
}
