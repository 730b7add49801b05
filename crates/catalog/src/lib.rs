//! In-memory cookbook catalog.
//!
//! The [`Catalog`] holds the current [`Snapshot`] of every cookbook version
//! upstream offers, and the [`Poller`] rebuilds it on an interval. Snapshots
//! are immutable and replaced whole: a reader either sees the previous
//! catalog or the next one, never something in between.
//!
//! # Refresh Discipline
//! - One refresh at a time; callers that arrive mid-refresh wait, then share
//!   a single follow-up run.
//! - Versions already cached are never fetched again.
//! - A version that disappears from the upstream listing disappears from the
//!   next snapshot.
//! - A failed listing changes nothing.

mod catalog;
pub mod error;
mod poller;
mod snapshot;

pub use crate::catalog::{Catalog, MAX_DETAIL_CONCURRENCY, RefreshOutcome, RefreshStats};
pub use crate::poller::Poller;
pub use crate::snapshot::{LocationKind, Snapshot, VersionRecord, location_path};
