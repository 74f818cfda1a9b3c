//! Bookings and their lifecycle.
//!
//! A booking is created pending from a checked-out cart item or an accepted
//! quote, carries an immutable snapshot of the service as priced, and is moved
//! through the role-gated transition table by its parties.

mod aggregate;
mod events;
mod service;
mod state;

pub use aggregate::{Booking, StatusEntry, party_tag};
pub use events::{
    BookingCreatedData, BookingEvent, BookingSource, ServiceSnapshot, StatusChangedData,
};
pub use service::BookingService;
pub use state::BookingStatus;

#[cfg(test)]
pub(crate) use aggregate::tests;
