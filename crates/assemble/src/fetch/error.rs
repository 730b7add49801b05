//! Error types for the [`fetch`](super) module.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single file download failed.
///
/// URLs are reported without their query string: download URLs carry
/// short-lived credentials there.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The HTTP client couldn't be constructed.
    #[display("couldn't build HTTP client")]
    Client,
    /// No response (DNS, TLS, connection reset, timeout).
    #[display("request to {_0} failed")]
    Transport(#[error(not(source))] String),
    /// The server answered with a non-success status.
    #[display("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    /// The response body couldn't be read to the end.
    #[display("couldn't read response body from {_0}")]
    Body(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Body(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Client => false,
        }
    }
}
