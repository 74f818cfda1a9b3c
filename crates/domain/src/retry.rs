//! Automatic retry for lost optimistic-concurrency races.

use std::future::Future;

use crate::error::DomainError;

/// How many times to run an operation that keeps losing races.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` runs have failed with `ConcurrentModification`.
    ///
    /// Each run must do its own reads, so every attempt sees fresh state.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(attempt, error = %e, "Retrying after concurrent modification");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
