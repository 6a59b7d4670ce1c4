//! Tracker Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A tracker error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The worker task has shut down; no further cache operations are
    /// possible on this handle.
    #[display("cache tracker has shut down")]
    Closed,
    /// Configuration could not be loaded or parsed.
    #[display("configuration error")]
    Config,
    /// A resource listing could not be fetched. Treated as "zero resources
    /// for this class" by the orchestrator; surfaced here for listers that
    /// want a typed failure.
    #[display("resource listing failed: {_0}")]
    ResourceList(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceList(_))
    }
}
