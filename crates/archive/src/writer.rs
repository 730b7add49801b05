//! Streaming tarball writer.

use crate::error::{ErrorKind, Result};
use crate::path::validate;
use exn::ResultExt;
use flate2::{Compression as GzCompression, write::GzEncoder};
use std::io::Write;
use tar::{Builder, EntryType, Header};
use time::UtcDateTime;
use tracing::instrument;

// Cookbooks are small text files and the artifact is rebuilt on every
// request, so favour speed over the last few percent of size.
const GZIP_LEVEL: GzCompression = GzCompression::fast();
/// Permission bits applied to every entry; upstream provides none.
pub const ENTRY_MODE: u32 = 0o644;

/// Writes tar entries into an in-memory gzip compressor.
///
/// Every entry shares one modification time, fixed when the writer is
/// constructed, since upstream provides no per-file timestamps. Entries are
/// written in exactly the order [`append`](Self::append) is called; nothing is
/// sorted or buffered aside from the compressor's own window.
///
/// # Examples
///
/// ```
/// use bodega_archive::{ArchiveWriter, read_entries};
///
/// let mut writer = ArchiveWriter::with_mtime(1_700_000_000);
/// writer.append("apache2/metadata.rb", b"name 'apache2'").unwrap();
/// writer.append("apache2/recipes/default.rb", b"package 'httpd'").unwrap();
/// let bytes = writer.finish().unwrap();
///
/// let entries = read_entries(&bytes).unwrap();
/// assert_eq!(entries[0].path, "apache2/metadata.rb");
/// assert_eq!(entries[1].data, b"package 'httpd'");
/// ```
pub struct ArchiveWriter<W: Write = Vec<u8>> {
    builder: Builder<GzEncoder<W>>,
    mtime: u64,
    entries: usize,
}

impl ArchiveWriter<Vec<u8>> {
    /// Create an in-memory writer stamped with the current time.
    pub fn new() -> Self {
        // Infallible after 1970: negative timestamps collapse to the epoch.
        let now = u64::try_from(UtcDateTime::now().unix_timestamp()).unwrap_or(0);
        Self::with_mtime(now)
    }

    /// Create an in-memory writer with an explicit modification time (seconds
    /// since the Unix epoch) for every entry.
    pub fn with_mtime(mtime: u64) -> Self {
        Self::from_writer(Vec::new(), mtime)
    }
}
impl Default for ArchiveWriter<Vec<u8>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ArchiveWriter<W> {
    /// Wrap an arbitrary sink.
    pub fn from_writer(inner: W, mtime: u64) -> Self {
        // Headers are built by hand in `append`, so nothing from the local
        // filesystem leaks into them.
        let builder = Builder::new(GzEncoder::new(inner, GZIP_LEVEL));
        Self { builder, mtime, entries: 0 }
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Append one regular file entry.
    ///
    /// The path is normalized by [`validate_entry_path`](crate::validate_entry_path);
    /// anything escaping the archive root is rejected with
    /// [`InvalidPath`](ErrorKind::InvalidPath).
    #[instrument(level = "debug", skip(self, data), fields(size = data.len()))]
    pub fn append(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = validate(path)?;
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(self.mtime);
        // `append_data` writes the path (with a GNU long-name record when
        // needed) and recomputes the checksum.
        self.builder.append_data(&mut header, &path, data).or_raise(|| ErrorKind::Io)?;
        self.entries += 1;
        Ok(())
    }

    /// Write the tar trailer, finalize the compressor, and return the sink.
    #[instrument(level = "debug", skip(self), fields(entries = self.entries))]
    pub fn finish(self) -> Result<W> {
        let encoder = self.builder.into_inner().or_raise(|| ErrorKind::Io)?;
        encoder.finish().or_raise(|| ErrorKind::Io)
    }
}
