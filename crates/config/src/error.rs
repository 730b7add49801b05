//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// All of these are fatal at startup: fix the configuration and try again.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source couldn't be read or parsed, or a value had the wrong type.
    #[display("couldn't load configuration")]
    Load,
    /// The explicit config file doesn't exist.
    #[display("config file not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The explicit config file has an extension we don't know how to parse.
    #[display("unsupported config file format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// Loaded fine, but a value makes no sense.
    #[display("invalid configuration: {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid { field: field.to_string(), reason: reason.into() }
    }
}
