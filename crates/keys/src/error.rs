//! Key Derivation Error Types

use derive_more::{Display, Error};

/// A key derivation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for key derivation.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The locator is structurally unusable as a cache identity: no host,
    /// or an opaque (non-hierarchical) URL.
    #[display("invalid locator: {_0}")]
    InvalidLocator(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A structurally invalid locator stays invalid.
        false
    }
}
