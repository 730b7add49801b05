//! Assembly Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An assembly error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for assembly operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant carries the `name/version` being assembled so the message
/// stands on its own in a response body or a log line.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The catalog doesn't know this version. Nothing was requested upstream.
    #[display("cookbook version {_0} not found")]
    NotFound(#[error(not(source))] String),
    /// Upstream couldn't provide a fresh manifest for the version.
    #[display("couldn't resolve {_0} upstream")]
    Resolve(#[error(not(source))] String),
    /// Downloading one of the version's files failed.
    #[display("failed to fetch {path} for {id}")]
    Fetch { id: String, path: String },
    /// Writing the tarball failed (including upstream paths that would escape
    /// the archive root).
    #[display("failed to write archive for {_0}")]
    Archive(#[error(not(source))] String),
    /// A pipeline stage died without reporting a result.
    #[display("assembly pipeline for {_0} broke down")]
    Pipeline(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Upstream hiccups are worth another try; the source error in the tree
    /// says whether that's likely.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resolve(_) | Self::Fetch { .. })
    }
}
