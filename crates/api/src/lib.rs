//! HTTP API for the marketplace booking engine.
//!
//! Exposes cart, booking, quote, catalog-deletion and notification endpoints
//! over the domain services, with structured logging (tracing) and Prometheus
//! metrics.

pub mod actor;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use actor::CurrentActor;
pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, Collaborators};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Cart
        .route(
            "/cart",
            get(routes::cart::list::<S>).post(routes::cart::add::<S>),
        )
        .route(
            "/cart/{id}",
            patch(routes::cart::set_quantity::<S>).delete(routes::cart::remove::<S>),
        )
        .route("/cart/{id}/checkout", post(routes::cart::checkout::<S>))
        // Bookings
        .route("/bookings", get(routes::bookings::list::<S>))
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
        .route(
            "/bookings/{id}/transition",
            post(routes::bookings::transition::<S>),
        )
        .route("/dashboard", get(routes::bookings::dashboard::<S>))
        .route("/admin/bookings", get(routes::bookings::by_status::<S>))
        // Quotes
        .route(
            "/quotes",
            get(routes::quotes::list::<S>).post(routes::quotes::request::<S>),
        )
        .route("/quotes/{id}", get(routes::quotes::get::<S>))
        .route("/quotes/{id}/submit", post(routes::quotes::submit::<S>))
        .route("/quotes/{id}/accept", post(routes::quotes::accept::<S>))
        .route("/quotes/{id}/decline", post(routes::quotes::decline::<S>))
        // Catalog deletion guard
        .route(
            "/catalog/{kind}/{id}",
            axum::routing::delete(routes::catalog::delete::<S>),
        )
        .route(
            "/catalog/{kind}/{id}/dependencies",
            get(routes::catalog::dependencies::<S>),
        )
        .route(
            "/catalog/{kind}/{id}/override",
            post(routes::catalog::request_override::<S>),
        )
        .route(
            "/catalog/{kind}/{id}/deactivate",
            post(routes::catalog::deactivate::<S>),
        )
        .route(
            "/overrides/{ticket_id}/confirm",
            post(routes::catalog::confirm_override::<S>),
        )
        // Notifications
        .route(
            "/notifications/unread",
            get(routes::notifications::unread::<S>),
        )
        .route(
            "/notifications/bookings/{id}/ack",
            post(routes::notifications::acknowledge::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
