//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Listing upstream failed; the refresh was abandoned and the previous
    /// snapshot is still being served.
    #[display("upstream listing failed; previous snapshot kept")]
    Upstream,
    /// [`Poller::start`](crate::Poller::start) was called on a poller that
    /// is already polling or has been stopped.
    #[display("poller already started")]
    AlreadyStarted,
    /// [`Poller::stop`](crate::Poller::stop) was called on a poller that
    /// isn't polling.
    #[display("poller is not polling")]
    NotPolling,
    /// Polling every zero seconds isn't polling.
    #[display("poll interval must be greater than zero")]
    InvalidInterval,
    /// The polling task panicked or was aborted.
    #[display("polling task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream)
    }
}
