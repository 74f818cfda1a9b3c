//! Query side of the booking engine.
//!
//! Events written by the domain services are folded into dashboard read
//! models by a [`ProjectionProcessor`]:
//! - [`Projection`] processes events into a read model
//! - [`ReadModel`] gives query access to the folded data
//! - [`BookingBoardView`] groups each user's bookings by status and sums
//!   provider earnings

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{BoardColumn, BookingBoard, BookingBoardView, BookingCard};
