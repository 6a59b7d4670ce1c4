//! Cache-change notifications for UI invalidation.

use offprint_keys::ContentKey;

/// Broadcast after a download or migration completes (`is_cached = true`) and
/// after a deletion is confirmed and purged (`is_cached = false`).
///
/// Delivered on a `tokio::sync::broadcast` channel; subscribe through
/// [`Tracker::subscribe`](crate::Tracker::subscribe). Slow subscribers may
/// observe lag, never corruption — the store remains the source of truth and
/// a lagging UI can always re-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheChange {
    pub key: ContentKey,
    pub is_cached: bool,
}
