//! Dashboard read models.

pub mod booking_board;

pub use booking_board::{BoardColumn, BookingBoard, BookingBoardView, BookingCard};
