//! Projection trait and catch-up position.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How far into the global event order a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }

    /// True if the event at 1-based `index` in the global order has not been
    /// handled yet.
    pub fn is_behind(&self, index: u64) -> bool {
        self.events_processed < index
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Folds events into a read model.
///
/// Every event delivered must advance the position, including events from
/// streams the projection ignores, so catch-up can resume by index.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all folded state and rewinds to zero.
    async fn reset(&self) -> Result<()>;
}
