//! Archive inspection.
//!
//! Not gated behind `#[cfg(test)]` so that other crates can also use this in
//! their tests.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use tar::Archive;

/// A single decoded archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub mode: u32,
    pub mtime: u64,
    pub data: Vec<u8>,
}

/// Decompress and decode every entry of a gzip tarball, in archive order.
pub fn read_entries(bytes: &[u8]) -> Result<Vec<Entry>> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    let mut entries = Vec::new();
    for entry in archive.entries().or_raise(|| ErrorKind::InvalidData)? {
        let mut entry = entry.or_raise(|| ErrorKind::InvalidData)?;
        let path = entry.path().or_raise(|| ErrorKind::InvalidData)?.to_string_lossy().into_owned();
        let header = entry.header();
        let mode = header.mode().or_raise(|| ErrorKind::InvalidData)?;
        let mtime = header.mtime().or_raise(|| ErrorKind::InvalidData)?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data).or_raise(|| ErrorKind::InvalidData)?;
        entries.push(Entry { path, mode, mtime, data });
    }
    Ok(entries)
}
