//! Query side of a view.

/// Read access shared by every dashboard view.
///
/// `count` is a cheap size probe for health output and tests; it never waits
/// on a running catch-up and reports 0 while one holds the write lock.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn count(&self) -> usize;
}
