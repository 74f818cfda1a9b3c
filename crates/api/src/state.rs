//! Shared application state.

use std::sync::Arc;

use domain::{
    BookingService, BroadcastInvalidator, CartService, Catalog, ChatService, DependencyGuard,
    NotificationCounter, QuoteService, RetryPolicy,
};
use event_store::EventStore;
use projections::{BookingBoardView, ProjectionProcessor};

use crate::config::Config;

/// External systems the engine reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub chat: Arc<dyn ChatService>,
}

/// Everything handlers need, shared behind an `Arc`.
pub struct AppState<S: EventStore + Clone> {
    pub cart: CartService<S>,
    pub bookings: BookingService<S>,
    pub quotes: QuoteService<S>,
    pub guard: DependencyGuard<S>,
    pub notifications: NotificationCounter<S>,
    pub board: BookingBoardView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,

    /// Subscribe here to learn which cached carts and counters went stale.
    pub invalidations: BroadcastInvalidator,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    pub fn new(store: S, collaborators: Collaborators, config: &Config) -> Self {
        let invalidations = BroadcastInvalidator::default();
        let invalidator = Arc::new(invalidations.clone());

        let board = BookingBoardView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(board.clone()));

        Self {
            cart: CartService::new(
                store.clone(),
                collaborators.catalog.clone(),
                invalidator.clone(),
            ),
            bookings: BookingService::new(store.clone(), invalidator.clone())
                .with_retry(RetryPolicy::new(config.retry_max_attempts)),
            quotes: QuoteService::new(
                store.clone(),
                collaborators.catalog.clone(),
                invalidator.clone(),
            ),
            guard: DependencyGuard::new(store.clone(), collaborators.catalog)
                .with_ticket_ttl(chrono::Duration::seconds(config.override_ticket_ttl_secs)),
            notifications: NotificationCounter::new(store, collaborators.chat, invalidator),
            board,
            projection_processor: Arc::new(processor),
            invalidations,
        }
    }
}
