use crate::error::{ErrorKind, Result};
use crate::fetch::FetcherHandle;
use crate::pipeline::{self, Target};
use bodega_catalog::Snapshot;
use bodega_upstream::UpstreamHandle;
use exn::ResultExt;
use std::io::Cursor;
use std::sync::Arc;
use tracing::instrument;

/// Where a single assembly is in its lifecycle.
///
/// `Created → Resolving → Pipelining → Completed`, dropping to `Failed` from
/// any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Resolving,
    Pipelining,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_become(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Resolving) | (Resolving, Pipelining) | (Pipelining, Completed) | (Created | Resolving | Pipelining, Failed)
        )
    }
}

/// One request's worth of assembly work. Never shared.
#[derive(Debug)]
pub struct AssemblyJob {
    name: String,
    version: String,
    state: JobState,
    files: usize,
}

impl AssemblyJob {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), state: JobState::Created, files: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Number of files in the freshly resolved manifest (zero until resolved).
    pub fn files(&self) -> usize {
        self.files
    }

    /// `name/version`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    fn transition(&mut self, next: JobState) {
        debug_assert!(self.state.can_become(next), "invalid job transition {:?} -> {next:?}", self.state);
        tracing::debug!(from = ?self.state, to = ?next, "Assembly job transition");
        self.state = next;
    }

    /// Move to `Failed` if `result` is an error, passing it through.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.transition(JobState::Failed);
        }
        result
    }
}

/// A finished cookbook tarball (gzip-compressed tar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    version: String,
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.bytes)
    }

    /// Suggested download name, `{name}-{version}.tar.gz`.
    pub fn file_name(&self) -> String {
        format!("{}-{}.tar.gz", self.name, self.version)
    }
}

/// Rebuilds the tarball of one cookbook version from upstream.
///
/// Built per request from the catalog snapshot current at that moment, the
/// shared upstream client, and a fetcher of the request's own.
pub struct Assembler {
    snapshot: Arc<Snapshot>,
    upstream: UpstreamHandle,
    fetcher: FetcherHandle,
    mtime: Option<u64>,
}

impl Assembler {
    pub fn new(snapshot: Arc<Snapshot>, upstream: UpstreamHandle, fetcher: FetcherHandle) -> Self {
        Self { snapshot, upstream, fetcher, mtime: None }
    }

    /// Stamp every entry with `mtime` (seconds since the epoch) instead of the
    /// time the archive is written. Makes output byte-for-byte reproducible.
    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Build the artifact for `name`/`version`.
    ///
    /// See [`run`](Self::run) for the steps.
    pub async fn assemble(&self, name: &str, version: &str) -> Result<Artifact> {
        self.run(&mut AssemblyJob::new(name, version)).await
    }

    /// Drive `job` to completion.
    ///
    /// 1. The version must be in the snapshot, otherwise [`NotFound`](ErrorKind::NotFound)
    ///    before anything touches the network.
    /// 2. The manifest is fetched again from upstream; download URLs expire,
    ///    so the one cached in the snapshot is useless.
    /// 3. Files go through the [pipeline](crate::pipeline). Any failure fails
    ///    the whole artifact; partial archives are never returned.
    #[instrument(skip_all, fields(cookbook = %job.name, version = %job.version))]
    pub async fn run(&self, job: &mut AssemblyJob) -> Result<Artifact> {
        if !self.snapshot.contains(&job.name, &job.version) {
            job.transition(JobState::Failed);
            exn::bail!(ErrorKind::NotFound(job.id()));
        }

        job.transition(JobState::Resolving);
        let detail = self.upstream.version_detail(&job.name, &job.version).await.or_raise(|| ErrorKind::Resolve(job.id()));
        let detail = job.settle(detail)?;
        job.files = detail.manifest.len();

        job.transition(JobState::Pipelining);
        let target = Target { id: job.id(), prefix: job.name.clone(), mtime: self.mtime };
        let bytes = job.settle(pipeline::run(target, detail.manifest, Arc::clone(&self.fetcher)).await)?;

        job.transition(JobState::Completed);
        tracing::info!(files = job.files, bytes = bytes.len(), "Artifact assembled");
        Ok(Artifact { name: job.name.clone(), version: job.version.clone(), bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MockFetcher;
    use bodega_archive::{ENTRY_MODE, read_entries};
    use bodega_catalog::VersionRecord;
    use bodega_upstream::MockUpstream;
    use bodega_upstream::models::{Category, VersionDetail};
    use rstest::rstest;
    use std::io::Read;
    use std::time::Duration;

    const MTIME: u64 = 1_700_000_000;

    fn apache() -> VersionDetail {
        VersionDetail::new("apache2", "3.2.0")
            .with_file(Category::Files, "metadata.rb", "mock://metadata")
            .with_file(Category::Recipes, "recipes/default.rb", "mock://default")
    }

    fn three_files() -> VersionDetail {
        VersionDetail::new("nginx", "1.0.0")
            .with_file(Category::Recipes, "recipes/a.rb", "mock://a")
            .with_file(Category::Recipes, "recipes/b.rb", "mock://b")
            .with_file(Category::Recipes, "recipes/c.rb", "mock://c")
    }

    fn snapshot(details: &[VersionDetail]) -> Arc<Snapshot> {
        Arc::new(
            details
                .iter()
                .map(|d| (d.name.clone(), d.version.clone(), VersionRecord::from_detail(d.clone(), "http://proxy")))
                .collect(),
        )
    }

    fn setup(details: Vec<VersionDetail>, fetcher: MockFetcher) -> (Assembler, Arc<MockUpstream>, Arc<MockFetcher>) {
        let snapshot = snapshot(&details);
        let upstream = Arc::new(MockUpstream::with_versions(details));
        let fetcher = Arc::new(fetcher);
        let assembler = Assembler::new(snapshot, upstream.clone(), fetcher.clone()).with_mtime(MTIME);
        (assembler, upstream, fetcher)
    }

    fn apache_files() -> MockFetcher {
        MockFetcher::with_files([("mock://metadata", "name 'apache2'"), ("mock://default", "package 'httpd'")])
    }

    #[tokio::test]
    async fn test_assembles_every_file_in_order() {
        let (assembler, _upstream, _fetcher) = setup(vec![apache()], apache_files());
        let artifact = assembler.assemble("apache2", "3.2.0").await.unwrap();
        assert_eq!(artifact.file_name(), "apache2-3.2.0.tar.gz");

        let entries = read_entries(artifact.as_bytes()).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["apache2/metadata.rb", "apache2/recipes/default.rb"]);
        assert_eq!(entries[0].data, b"name 'apache2'");
        assert_eq!(entries[1].data, b"package 'httpd'");
        assert!(entries.iter().all(|e| e.mode == ENTRY_MODE && e.mtime == MTIME));
    }

    #[tokio::test]
    async fn test_unknown_version_makes_no_requests() {
        let (assembler, upstream, fetcher) = setup(vec![apache()], apache_files());
        let mut job = AssemblyJob::new("foo", "9.9.9");
        let err = assembler.run(&mut job).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("foo/9.9.9"), "{message}");
        assert!(message.contains("not found"), "{message}");
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(upstream.detail_calls(), 0);
        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_fails_whole_artifact() {
        let fetcher = MockFetcher::with_files([("mock://a", "a"), ("mock://b", "b"), ("mock://c", "c")])
            .with_status("mock://b", 404);
        let (assembler, _upstream, fetcher) = setup(vec![three_files()], fetcher);
        let mut job = AssemblyJob::new("nginx", "1.0.0");
        let err = assembler.run(&mut job).await.unwrap_err();

        assert_eq!(*err, ErrorKind::Fetch { id: "nginx/1.0.0".to_string(), path: "recipes/b.rb".to_string() });
        assert!(err.to_string().contains("recipes/b.rb"));
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.files(), 3);
        assert_eq!(fetcher.requests().await, ["mock://a", "mock://b"]);
    }

    #[tokio::test]
    async fn test_version_gone_upstream_is_resolve_error() {
        let (assembler, upstream, fetcher) = setup(vec![apache()], apache_files());
        upstream.remove("apache2", "3.2.0").await;
        let mut job = AssemblyJob::new("apache2", "3.2.0");
        let err = assembler.run(&mut job).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Resolve("apache2/3.2.0".to_string()));
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn test_uses_fresh_manifest() {
        let (assembler, upstream, _fetcher) = setup(vec![apache()], apache_files());
        // Upstream re-signed the URLs since the catalog cached them.
        let resigned = VersionDetail::new("apache2", "3.2.0").with_file(Category::Files, "metadata.rb", "mock://fresh");
        upstream.insert(resigned).await;
        let fetcher = Arc::new(MockFetcher::with_files([("mock://fresh", "fresh")]));
        let assembler = Assembler::new(Arc::clone(&assembler.snapshot), upstream, fetcher.clone());

        let artifact = assembler.assemble("apache2", "3.2.0").await.unwrap();
        assert_eq!(read_entries(artifact.as_bytes()).unwrap()[0].data, b"fresh");
        assert_eq!(fetcher.requests().await, ["mock://fresh"]);
    }

    #[rstest]
    #[case(Duration::ZERO)]
    #[case(Duration::from_millis(5))]
    #[tokio::test(start_paused = true)]
    async fn test_identical_inputs_identical_bytes(#[case] latency: Duration) {
        let files = || MockFetcher::with_files([("mock://a", "a"), ("mock://b", "b"), ("mock://c", "c")]);
        let (first, _, _) = setup(vec![three_files()], files().with_latency(latency));
        let (second, _, _) = setup(vec![three_files()], files());
        let one = first.assemble("nginx", "1.0.0").await.unwrap();
        let two = second.assemble("nginx", "1.0.0").await.unwrap();
        assert_eq!(one, two);
    }

    #[tokio::test]
    async fn test_empty_manifest_is_empty_archive() {
        let (assembler, _, fetcher) = setup(vec![VersionDetail::new("empty", "0.0.1")], MockFetcher::default());
        let artifact = assembler.assemble("empty", "0.0.1").await.unwrap();
        assert!(!artifact.is_empty());
        assert!(read_entries(artifact.as_bytes()).unwrap().is_empty());
        assert_eq!(fetcher.request_count(), 0);
    }

    #[tokio::test]
    async fn test_artifact_accessors() {
        let (assembler, _, _) = setup(vec![apache()], apache_files());
        let artifact = assembler.assemble("apache2", "3.2.0").await.unwrap();
        let mut read = Vec::new();
        artifact.reader().read_to_end(&mut read).unwrap();
        assert_eq!(read.len(), artifact.len());
        assert_eq!(read, artifact.into_bytes());
    }

    #[rstest]
    #[case(JobState::Created, JobState::Resolving, true)]
    #[case(JobState::Resolving, JobState::Pipelining, true)]
    #[case(JobState::Pipelining, JobState::Completed, true)]
    #[case(JobState::Created, JobState::Failed, true)]
    #[case(JobState::Pipelining, JobState::Failed, true)]
    #[case(JobState::Created, JobState::Completed, false)]
    #[case(JobState::Completed, JobState::Failed, false)]
    #[case(JobState::Failed, JobState::Resolving, false)]
    fn test_job_transitions(#[case] from: JobState, #[case] to: JobState, #[case] allowed: bool) {
        assert_eq!(from.can_become(to), allowed);
    }

    #[tokio::test]
    async fn test_job_completes() {
        let (assembler, _, _) = setup(vec![apache()], apache_files());
        let mut job = AssemblyJob::new("apache2", "3.2.0");
        assert_eq!(job.state(), JobState::Created);
        assembler.run(&mut job).await.unwrap();
        assert_eq!(job.state(), JobState::Completed);
        assert!(job.state().is_terminal());
        assert_eq!(job.files(), 2);
    }
}
