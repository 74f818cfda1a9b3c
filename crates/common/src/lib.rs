//! Identifiers and actor types shared by every crate in the workspace.

mod types;

pub use types::{Actor, AggregateId, Role, UserId};
