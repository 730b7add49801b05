//! Gzip-compressed tarballs for cookbook artifacts.
//!
//! [`ArchiveWriter`] wraps a [`tar::Builder`] around a streaming
//! [`flate2`] gzip encoder. Entries are appended in caller order with fixed
//! permission bits and a single shared modification time, so two builds from
//! the same file list produce the same entry list in the same order.

pub mod error;
mod path;
mod read;
mod writer;

pub use crate::path::validate as validate_entry_path;
pub use crate::read::{Entry, read_entries};
pub use crate::writer::{ArchiveWriter, ENTRY_MODE};
