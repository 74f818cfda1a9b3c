//! Cache invalidation notifications for the presentation layer.
//!
//! The engine does not cache anything itself. It tells whoever renders carts
//! and counters which per-user reads went stale after a successful mutation.

use common::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A cached read that a mutation made stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cache", content = "user_id", rename_all = "snake_case")]
pub enum CacheKey {
    /// The client's cart listing.
    Cart(UserId),
    /// The user's unread/pending counter.
    UnreadCount(UserId),
}

/// Receives invalidations after each successful mutation.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, key: CacheKey);
}

/// Discards every invalidation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate(&self, _key: CacheKey) {}
}

/// Fans invalidations out to any number of subscribers.
///
/// Sending never blocks; with no subscribers the key is dropped, and a slow
/// subscriber sees `RecvError::Lagged` rather than holding up writers.
#[derive(Debug, Clone)]
pub struct BroadcastInvalidator {
    sender: broadcast::Sender<CacheKey>,
}

impl BroadcastInvalidator {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastInvalidator {
    fn default() -> Self {
        Self::new(256)
    }
}

impl CacheInvalidator for BroadcastInvalidator {
    fn invalidate(&self, key: CacheKey) {
        tracing::trace!(?key, "Cache invalidated");
        // No receivers is not an error
        let _ = self.sender.send(key);
    }
}
