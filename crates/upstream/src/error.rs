//! Upstream Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An upstream error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upstream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client key material is missing, unreadable, or not an RSA private key.
    /// Fix the configuration; nothing will work until then.
    #[display("invalid client credentials: {_0}")]
    Credentials(#[error(not(source))] String),
    /// The configured server URL can't be used as a base for API paths.
    #[display("invalid upstream URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// Request never produced a response (DNS, TLS, connection reset, timeout).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Upstream answered with a non-success status.
    #[display("upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    /// The requested cookbook version does not exist upstream.
    #[display("cookbook version not found upstream: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Response body could not be read or decoded.
    #[display("invalid upstream response from {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// Signing the request failed.
    #[display("request signing failed")]
    Signing,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Network("reset".into()), true)]
    #[case(ErrorKind::Status { status: 503, url: "u".into() }, true)]
    #[case(ErrorKind::Status { status: 429, url: "u".into() }, true)]
    #[case(ErrorKind::Status { status: 403, url: "u".into() }, false)]
    #[case(ErrorKind::NotFound("apache2/3.2.0".into()), false)]
    #[case(ErrorKind::Credentials("bad".into()), false)]
    #[case(ErrorKind::InvalidResponse("u".into()), false)]
    fn test_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn test_display() {
        let kind = ErrorKind::Status { status: 404, url: "https://chef/cookbooks".into() };
        assert_eq!(kind.to_string(), "upstream returned HTTP 404 for https://chef/cookbooks");
    }
}
