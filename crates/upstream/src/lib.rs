//! Client side of the registry the proxy fronts.
//!
//! [`UpstreamClient`] is the seam: the catalog and the assembler only ever see
//! a [`UpstreamHandle`]. [`ChefServer`] speaks the signed Chef Server API;
//! `MockUpstream` (behind the `mock` feature) backs tests.

mod client;
pub mod error;
pub mod models;
pub mod sign;

#[cfg(feature = "mock")]
pub use crate::client::MockUpstream;
pub use crate::client::{ChefServer, UpstreamClient};
use std::sync::Arc;

pub type UpstreamHandle = Arc<dyn UpstreamClient + Send + Sync>;
