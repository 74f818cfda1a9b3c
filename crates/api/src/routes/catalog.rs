//! Guarded deletion of catalog services and charging types.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::guard::CatalogDeletion;
use domain::{CatalogEntity, ChargingTypeId, DependencyCheckResult, OverrideTicket, ServiceId};
use event_store::EventStore;

use super::parse_uuid;
use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

fn parse_entity(kind: &str, id: &str) -> Result<CatalogEntity, ApiError> {
    let uuid = parse_uuid(id, "ID format")?;
    match kind {
        "services" => Ok(CatalogEntity::Service(ServiceId::from_uuid(uuid))),
        "charging-types" => Ok(CatalogEntity::ChargingType(ChargingTypeId::from_uuid(uuid))),
        other => Err(ApiError::BadRequest(format!(
            "unknown catalog collection {other}; expected services or charging-types"
        ))),
    }
}

/// GET /catalog/:kind/:id/dependencies: what would block a delete.
#[tracing::instrument(skip(state))]
pub async fn dependencies<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(_actor): CurrentActor,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<DependencyCheckResult>, ApiError> {
    let entity = parse_entity(&kind, &id)?;
    Ok(Json(state.guard.check_deletable(entity).await?))
}

/// DELETE /catalog/:kind/:id: refused with the warnings while anything
/// references the entity.
#[tracing::instrument(skip(state))]
pub async fn delete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<CatalogDeletion>, ApiError> {
    let entity = parse_entity(&kind, &id)?;
    let result = state.guard.delete(entity, &actor).await?;
    Ok(Json(result.aggregate))
}

/// POST /catalog/:kind/:id/override: admin asks to delete despite the
/// warnings; returns the ticket to confirm.
#[tracing::instrument(skip(state))]
pub async fn request_override<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path((kind, id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<OverrideTicket>), ApiError> {
    let entity = parse_entity(&kind, &id)?;
    let ticket = state.guard.request_forced_delete(entity, &actor).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// POST /overrides/:ticket_id/confirm: carries out a forced delete.
#[tracing::instrument(skip(state))]
pub async fn confirm_override<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(ticket_id): Path<String>,
) -> Result<Json<CatalogDeletion>, ApiError> {
    let ticket_id = parse_uuid(&ticket_id, "ticket_id")?;
    let result = state.guard.confirm_forced_delete(ticket_id, &actor).await?;
    Ok(Json(result.aggregate))
}

/// POST /catalog/services/:id/deactivate: hide a service without deleting
/// its history.
#[tracing::instrument(skip(state))]
pub async fn deactivate<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let CatalogEntity::Service(service_id) = parse_entity(&kind, &id)? else {
        return Err(ApiError::BadRequest(
            "only services can be deactivated".to_string(),
        ));
    };
    state.guard.deactivate_service(service_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
