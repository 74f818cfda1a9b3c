//! Caller identity, as asserted by the gateway in front of this service.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Actor, Role, UserId};

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The verified actor behind a request.
///
/// Authentication happens upstream; this only reads the result from the
/// `x-actor-id` and `x-actor-role` headers.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?;
        let role = header(parts, ACTOR_ROLE_HEADER)?;

        let id = uuid::Uuid::parse_str(id)
            .map_err(|e| ApiError::Unauthenticated(format!("invalid {ACTOR_ID_HEADER}: {e}")))?;
        let role: Role = role
            .parse()
            .map_err(|e| ApiError::Unauthenticated(format!("invalid {ACTOR_ROLE_HEADER}: {e}")))?;

        Ok(CurrentActor(Actor::new(UserId::from(id), role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated(format!("{name} is not valid text")))
}
