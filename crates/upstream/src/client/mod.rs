//! Upstream client trait and implementations.
//!
//! This module defines the [`UpstreamClient`] trait, the only view the rest of
//! the proxy has of the registry it fronts. Authentication, TLS and wire
//! formats all stay behind it.

mod chef;
#[cfg(feature = "mock")]
mod mock;

pub use self::chef::ChefServer;
#[cfg(feature = "mock")]
pub use self::mock::MockUpstream;
use crate::error::Result;
use crate::models::{VersionDetail, VersionListing};
use async_trait::async_trait;

/// Unified interface for cookbook registries.
///
/// All operations are asynchronous and take `&self`, so a single client can
/// be shared between the poller and any number of request handlers.
///
/// # Examples
///
/// ```
/// use bodega_upstream::{UpstreamClient, error::Result};
///
/// async fn count_versions(upstream: &dyn UpstreamClient) -> Result<usize> {
///     let listing = upstream.list_all_versions().await?;
///     Ok(listing.values().map(Vec::len).sum())
/// }
/// ```
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Name of the upstream (used for logging only).
    fn name(&self) -> &str;

    /// List every version of every cookbook in a single call.
    ///
    /// The result must be a complete snapshot; callers treat anything missing
    /// from it as deleted upstream.
    async fn list_all_versions(&self) -> Result<VersionListing>;

    /// Fetch the file manifest and dependency metadata of one version.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if upstream
    /// doesn't know the version. File URLs in the returned manifest may carry
    /// short-lived credentials; fetch them soon.
    async fn version_detail(&self, name: &str, version: &str) -> Result<VersionDetail>;
}
