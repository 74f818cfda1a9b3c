//! HTTP handlers, one module per resource.

pub mod bookings;
pub mod cart;
pub mod catalog;
pub mod health;
pub mod metrics;
pub mod notifications;
pub mod quotes;

use common::{AggregateId, UserId};
use uuid::Uuid;

use crate::error::ApiError;

fn parse_uuid(id: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    parse_uuid(id, "ID format").map(AggregateId::from)
}

pub(crate) fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    parse_uuid(id, "user_id").map(UserId::from)
}
