//! The two-stage fetch → archive pipeline.
//!
//! ```text
//! manifest ──▶ [files: 100] ──▶ fetch stage ──▶ [fetched: 100] ──▶ archive stage ──▶ oneshot
//!                               (tokio task)                       (tokio task)
//! ```
//!
//! The fetch stage downloads one file at a time, so entries reach the archive
//! in manifest order. It forwards the first failure as a terminal `Err` item
//! and stops. The archive stage owns the result channel and resolves it
//! exactly once: with the finished tarball, or with the first error it sees.
//! Nothing else can complete the result, and a stage dying without resolving
//! it shows up as a closed channel.
//!
//! Both stages are ordinary tasks. Waiting on the network never holds a
//! thread; the archive stage only does CPU work once a file is fully buffered.

use crate::error::{ErrorKind, Result};
use crate::fetch::FetcherHandle;
use bodega_archive::ArchiveWriter;
use bodega_upstream::models::{Manifest, ManifestFile};
use exn::ResultExt;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

/// Capacity of both inter-stage queues.
pub const QUEUE_DEPTH: usize = 100;

struct FetchedFile {
    path: String,
    data: Vec<u8>,
}

/// What the pipeline needs to know about the artifact it's building.
pub(crate) struct Target {
    /// `name/version`, for errors and logs.
    pub id: String,
    /// Directory every entry is placed under (the cookbook name).
    pub prefix: String,
    /// Shared entry modification time; `None` stamps the current time.
    pub mtime: Option<u64>,
}

#[instrument(skip_all, fields(id = %target.id, files = manifest.len()))]
pub(crate) async fn run(target: Target, manifest: Manifest, fetcher: FetcherHandle) -> Result<Vec<u8>> {
    let expected = manifest.len();
    let (files_tx, files_rx) = mpsc::channel(QUEUE_DEPTH);
    let (fetched_tx, fetched_rx) = mpsc::channel(QUEUE_DEPTH);
    let (result_tx, result_rx) = oneshot::channel();

    let fetch = tokio::spawn(fetch_stage(target.id.clone(), fetcher, files_rx, fetched_tx));
    let id = target.id.clone();
    let archive = tokio::spawn(async move {
        // The receiver only disappears if the caller stopped waiting.
        let _ = result_tx.send(archive_stage(&target, expected, fetched_rx).await);
    });

    for file in manifest {
        if files_tx.send(file).await.is_err() {
            // Fetch stage stopped early; the result says why.
            break;
        }
    }
    drop(files_tx);

    let result = result_rx.await.or_raise(|| ErrorKind::Pipeline(id.clone()));
    // Both stages have let go of their queues by now; this only reaps them.
    let (fetch, archive) = (fetch.await, archive.await);
    if fetch.is_err() || archive.is_err() {
        tracing::error!(fetch_ok = fetch.is_ok(), archive_ok = archive.is_ok(), "Pipeline stage panicked");
    }
    result?
}

async fn fetch_stage(
    id: String,
    fetcher: FetcherHandle,
    mut files: mpsc::Receiver<ManifestFile>,
    fetched: mpsc::Sender<Result<FetchedFile>>,
) {
    while let Some(file) = files.recv().await {
        tracing::debug!(path = %file.path, category = %file.category, "Fetching file");
        let item = fetcher
            .fetch(&file.url)
            .await
            .or_raise(|| ErrorKind::Fetch { id: id.clone(), path: file.path.clone() })
            .map(|data| FetchedFile { path: file.path, data });
        let failed = item.is_err();
        if fetched.send(item).await.is_err() || failed {
            break;
        }
    }
}

async fn archive_stage(
    target: &Target,
    expected: usize,
    mut fetched: mpsc::Receiver<Result<FetchedFile>>,
) -> Result<Vec<u8>> {
    let mut writer = match target.mtime {
        Some(mtime) => ArchiveWriter::with_mtime(mtime),
        None => ArchiveWriter::new(),
    };
    while let Some(item) = fetched.recv().await {
        let file = item?;
        let path = format!("{}/{}", target.prefix, file.path);
        writer.append(&path, &file.data).or_raise(|| ErrorKind::Archive(target.id.clone()))?;
    }
    // The fetch stage ends its queue early only alongside an `Err` item, so a
    // short count means it died mid-way.
    if writer.len() != expected {
        exn::bail!(ErrorKind::Pipeline(target.id.clone()));
    }
    writer.finish().or_raise(|| ErrorKind::Archive(target.id.clone()))
}
