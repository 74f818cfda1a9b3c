//! Per-user notification counts.

mod chat;
mod counter;
mod inbox;

pub use chat::{ChatService, InMemoryChatService};
pub use counter::{NotificationCounter, UnreadCount};
pub use inbox::{BookingAcknowledgedData, Inbox, InboxEvent};
