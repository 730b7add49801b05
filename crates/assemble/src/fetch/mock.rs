//! In-memory fetcher for testing.

use super::error::{ErrorKind, Result};
use super::FileFetcher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Serves canned bodies by URL and remembers what was asked for.
///
/// Unknown URLs answer with a 404, like an expired or mistyped download URL
/// would.
///
/// # Examples
///
/// ```
/// use bodega_assemble::fetch::{FileFetcher, MockFetcher};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> bodega_assemble::fetch::Result<()> {
/// let fetcher = MockFetcher::with_files([("mock://metadata.rb", "name 'apache2'")]);
/// assert_eq!(fetcher.fetch("mock://metadata.rb").await?, b"name 'apache2'");
/// assert!(fetcher.fetch("mock://missing").await.is_err());
/// assert_eq!(fetcher.request_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    statuses: HashMap<String, u16>,
    latency: Option<Duration>,
    requests: Mutex<Vec<String>>,
    count: AtomicUsize,
}

impl MockFetcher {
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let bodies = files.into_iter().map(|(url, body)| (url.into(), body.into())).collect();
        Self { bodies, ..Self::default() }
    }

    /// Answer `url` with `status` instead of a body.
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.statuses.insert(url.into(), status);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn request_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Every URL requested so far, in order.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl FileFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(url.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(status) = self.statuses.get(url) {
            exn::bail!(ErrorKind::Status { status: *status, url: url.to_string() });
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::Status { status: 404, url: url.to_string() }))
    }
}
