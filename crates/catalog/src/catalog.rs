use crate::error::{ErrorKind, Result};
use crate::snapshot::{Snapshot, VersionRecord};
use bodega_upstream::UpstreamHandle;
use bodega_upstream::models::VersionListing;
use exn::ResultExt;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Upper bound on version-detail requests in flight during one refresh.
pub const MAX_DETAIL_CONCURRENCY: usize = 8;

/// What a call to [`Catalog::refresh`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call ran a refresh and installed a new snapshot.
    Refreshed(RefreshStats),
    /// Another refresh started after this call was made and has already
    /// finished, so this call did nothing.
    Coalesced,
}

/// Counters for one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Versions carried over from the previous snapshot.
    pub reused: usize,
    /// Versions whose detail was fetched for the first time.
    pub fetched: usize,
    /// Versions left out because their detail couldn't be fetched.
    pub skipped: usize,
}

/// Process-lifetime index of every cookbook version upstream offers.
///
/// Readers get the current [`Snapshot`] behind an [`Arc`]; a refresh builds a
/// complete replacement on the side and swaps it in under a write lock held
/// for a single pointer store. At most one refresh runs at a time.
pub struct Catalog {
    upstream: UpstreamHandle,
    public_base_url: String,
    current: RwLock<Arc<Snapshot>>,
    refreshing: Mutex<()>,
    /// Number of refreshes that have started.
    started: AtomicU64,
}

impl Catalog {
    /// Empty catalog. Version records will point at `public_base_url`.
    pub fn new(upstream: UpstreamHandle, public_base_url: impl Into<String>) -> Self {
        Self {
            upstream,
            public_base_url: public_base_url.into(),
            current: RwLock::new(Arc::new(Snapshot::default())),
            refreshing: Mutex::new(()),
            started: AtomicU64::new(0),
        }
    }

    /// The current snapshot. Never blocks on an in-flight refresh.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Rebuild the snapshot from upstream.
    ///
    /// Calls arriving while a refresh is running wait for it. Once it's done,
    /// one of them runs the follow-up refresh and the rest return
    /// [`RefreshOutcome::Coalesced`]: a refresh that started after they asked
    /// has completed, which is all they wanted.
    ///
    /// Versions already in the snapshot are carried over without asking
    /// upstream again. A version whose detail can't be fetched is left out
    /// (and tried again next time). If the listing itself fails, nothing is
    /// installed and the previous snapshot keeps being served.
    #[instrument(skip(self), fields(upstream = %self.upstream.name()))]
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let seen = self.started.load(Ordering::SeqCst);
        let _guard = self.refreshing.lock().await;
        if self.started.load(Ordering::SeqCst) > seen {
            tracing::debug!("Refresh already ran while waiting; coalescing");
            return Ok(RefreshOutcome::Coalesced);
        }
        self.started.fetch_add(1, Ordering::SeqCst);

        tracing::info!("Refreshing catalog");
        let listing = self.upstream.list_all_versions().await.or_raise(|| ErrorKind::Upstream)?;
        let previous = self.snapshot().await;
        let (snapshot, stats) = self.rebuild(&previous, listing).await;
        tracing::info!(
            cookbooks = snapshot.cookbooks(),
            versions = snapshot.versions(),
            reused = stats.reused,
            fetched = stats.fetched,
            skipped = stats.skipped,
            "Catalog refreshed"
        );
        *self.current.write().await = Arc::new(snapshot);
        Ok(RefreshOutcome::Refreshed(stats))
    }

    async fn rebuild(&self, previous: &Snapshot, listing: VersionListing) -> (Snapshot, RefreshStats) {
        let mut stats = RefreshStats::default();
        let mut snapshot = Snapshot::default();
        let mut unknown = Vec::new();
        for (name, versions) in listing {
            for version in versions {
                match previous.get(&name, &version) {
                    Some(record) => {
                        snapshot.insert(name.clone(), version, record.clone());
                        stats.reused += 1;
                    },
                    None => unknown.push((name.clone(), version)),
                }
            }
        }

        let upstream = &self.upstream;
        let mut details = futures::stream::iter(unknown)
            .map(|(name, version)| async move {
                let detail = upstream.version_detail(&name, &version).await;
                (name, version, detail)
            })
            .buffer_unordered(MAX_DETAIL_CONCURRENCY);
        while let Some((name, version, detail)) = details.next().await {
            match detail {
                Ok(detail) => {
                    tracing::debug!(cookbook = %name, %version, files = detail.manifest.len(), "New version");
                    let record = VersionRecord::from_detail(detail, &self.public_base_url);
                    snapshot.insert(name, version, record);
                    stats.fetched += 1;
                },
                Err(err) => {
                    tracing::warn!(cookbook = %name, %version, error = %*err, "Skipping version; detail unavailable");
                    stats.skipped += 1;
                },
            }
        }
        (snapshot, stats)
    }
}
