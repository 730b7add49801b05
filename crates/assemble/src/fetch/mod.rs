//! Downloading individual cookbook files.
//!
//! The assembler only needs "GET this URL, give me the bytes". That sits
//! behind [`FileFetcher`] so the pipeline can be exercised without a network;
//! [`HttpFetcher`] is the real thing.

pub mod error;
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::error::{ErrorKind, Result};
pub use self::http::{FetchOptions, HttpFetcher};
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockFetcher;
use async_trait::async_trait;
use std::sync::Arc;

pub type FetcherHandle = Arc<dyn FileFetcher + Send + Sync>;

#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Download `url` in full.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// `url` minus its query string and fragment, safe to put in logs and errors.
pub(crate) fn redact(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
