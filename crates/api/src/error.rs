//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use projections::ProjectionError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller did not say who they are.
    #[error("{0}")]
    Unauthenticated(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Domain rule or lookup failure.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Read model refresh failed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => status_for(err.kind()),
            ApiError::Projection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Domain(err) => code_for(err.kind()),
            ApiError::Projection(_) => "internal",
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::IllegalTransition
        | ErrorKind::StaleCartItem
        | ErrorKind::ConcurrentModification
        | ErrorKind::DependencyBlocked => StatusCode::CONFLICT,
        ErrorKind::QuoteOnlyService => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn code_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unauthorized => "unauthorized",
        ErrorKind::QuoteOnlyService => "quote_only_service",
        ErrorKind::IllegalTransition => "illegal_transition",
        ErrorKind::StaleCartItem => "stale_cart_item",
        ErrorKind::ConcurrentModification => "concurrent_modification",
        ErrorKind::DependencyBlocked => "dependency_blocked",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Validation => "validation",
        ErrorKind::Internal => "internal",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        metrics::counter!("api_errors_total", "code" => code).increment(1);

        let mut body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Store and collaborator details stay in the logs.
            tracing::error!(error = %self, "internal server error");
            serde_json::json!({ "error": "internal server error", "code": code })
        } else {
            serde_json::json!({ "error": self.to_string(), "code": code })
        };

        if let ApiError::Domain(DomainError::DependencyBlocked { warnings }) = &self {
            body["warnings"] = serde_json::json!(warnings);
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::BookingStatus;

    #[test]
    fn domain_kinds_map_to_statuses() {
        let cases = [
            (DomainError::unauthorized("no"), StatusCode::FORBIDDEN),
            (DomainError::not_found("booking", "x"), StatusCode::NOT_FOUND),
            (
                DomainError::IllegalTransition {
                    from: BookingStatus::Pending,
                    to: BookingStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::QuoteOnlyService {
                    service: "Reforma".to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DomainError::Validation("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::Collaborator("down".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn dependency_blocked_body_lists_warnings() {
        let err = ApiError::from(DomainError::DependencyBlocked {
            warnings: vec!["this service has 12 linked orders".to_string()],
        });

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "dependency_blocked");
        assert_eq!(json["warnings"][0], "this service has 12 linked orders");
    }
}
