//! Order & booking lifecycle engine for a local-services marketplace.
//!
//! This crate provides:
//! - Aggregate trait and CommandHandler for event-sourced entities
//! - Pricing resolution against the catalog collaborator
//! - Cart items, bookings with their role-gated state machine, quote requests
//!   and provider earnings
//! - The dependency guard protecting catalog deletions
//! - Unread counters for UI polling

pub mod aggregate;
pub mod booking;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod command;
pub mod earnings;
pub mod error;
pub mod guard;
pub mod notification;
pub mod pricing;
pub mod quote;
pub mod retry;
pub mod value_objects;

#[cfg(test)]
mod testing;

pub use aggregate::{Aggregate, DomainEvent};
pub use booking::{Booking, BookingService, BookingStatus};
pub use cache::{BroadcastInvalidator, CacheInvalidator, CacheKey, NoopInvalidator};
pub use cart::{AddCartItem, CartItem, CartService};
pub use catalog::{Catalog, CatalogEntity, CatalogService, InMemoryCatalog};
pub use command::{CommandHandler, CommandResult, PendingCommit, commit_batch};
pub use earnings::ProviderEarning;
pub use error::{DomainError, ErrorKind};
pub use guard::{DependencyCheckResult, DependencyGuard, OverrideTicket};
pub use notification::{ChatService, InMemoryChatService, NotificationCounter, UnreadCount};
pub use pricing::{PriceResolution, resolve_price};
pub use quote::{QuoteRequest, QuoteService, RequestQuote};
pub use retry::RetryPolicy;
pub use value_objects::{ChargingTypeId, Money, Quantity, ServiceId};
