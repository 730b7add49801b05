//! In-memory upstream for testing.

use crate::client::UpstreamClient;
use crate::error::{ErrorKind, Result};
use crate::models::{VersionDetail, VersionListing};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

type Key = (String, String);

/// In-memory upstream for testing.
///
/// Versions live in a map behind a [`RwLock`], so tests can add and remove
/// versions between refreshes while the upstream is shared. Call counters and
/// a concurrency high-water mark make it possible to assert how often (and how
/// concurrently) the upstream was hit.
///
/// # Examples
///
/// ```
/// use bodega_upstream::{MockUpstream, UpstreamClient};
/// use bodega_upstream::models::{Category, VersionDetail};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> bodega_upstream::error::Result<()> {
/// let upstream = MockUpstream::with_versions([
///     VersionDetail::new("apache2", "3.2.0").with_file(Category::Recipes, "recipes/default.rb", "mock://r"),
/// ]);
/// let listing = upstream.list_all_versions().await?;
/// assert_eq!(listing["apache2"], ["3.2.0"]);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockUpstream {
    versions: RwLock<BTreeMap<Key, VersionDetail>>,
    failing_details: RwLock<BTreeSet<Key>>,
    unavailable: AtomicBool,
    latency: Option<Duration>,
    listing_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    active_listings: AtomicUsize,
    max_concurrent_listings: AtomicUsize,
}

impl MockUpstream {
    /// Create a mock upstream pre-populated with versions.
    pub fn with_versions(versions: impl IntoIterator<Item = VersionDetail>) -> Self {
        let versions = versions.into_iter().map(|detail| (key(&detail.name, &detail.version), detail)).collect();
        Self { versions: RwLock::new(versions), ..Self::default() }
    }

    /// Delay every call by `latency`. Handy for overlapping calls in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Publish a version (or replace it).
    pub async fn insert(&self, detail: VersionDetail) {
        self.versions.write().await.insert(key(&detail.name, &detail.version), detail);
    }

    /// Delete a version. Returns whether it existed.
    pub async fn remove(&self, name: &str, version: &str) -> bool {
        self.versions.write().await.remove(&key(name, version)).is_some()
    }

    /// Make the listing endpoint fail (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make detail lookups for one version fail with a server error while it
    /// remains in the listing.
    pub async fn fail_detail(&self, name: &str, version: &str) {
        self.failing_details.write().await.insert(key(name, version));
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    /// Most listing calls that were ever in flight at the same time.
    pub fn max_concurrent_listings(&self) -> usize {
        self.max_concurrent_listings.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn key(name: &str, version: &str) -> Key {
    (name.to_string(), version.to_string())
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_all_versions(&self) -> Result<VersionListing> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active_listings.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_listings.fetch_max(active, Ordering::SeqCst);
        self.delay().await;
        self.active_listings.fetch_sub(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network("mock upstream unavailable".to_string()));
        }
        let mut listing = VersionListing::new();
        for (name, version) in self.versions.read().await.keys() {
            listing.entry(name.clone()).or_default().push(version.clone());
        }
        Ok(listing)
    }

    async fn version_detail(&self, name: &str, version: &str) -> Result<VersionDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let key = key(name, version);
        if self.failing_details.read().await.contains(&key) {
            exn::bail!(ErrorKind::Status { status: 500, url: format!("mock://cookbooks/{name}/{version}") });
        }
        self.versions
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("{name}/{version}"))))
    }
}
