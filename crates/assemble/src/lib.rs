//! On-demand cookbook artifacts.
//!
//! Upstream stores cookbooks as loose files behind short-lived download URLs;
//! clients want a single tarball. For every download request an [`Assembler`]
//! re-resolves the version's manifest, streams each file through a bounded
//! two-stage [pipeline](crate::pipeline) and hands back the finished
//! [`Artifact`]. Nothing is cached between requests.

mod assembler;
pub mod error;
pub mod fetch;
pub mod pipeline;

pub use crate::assembler::{Artifact, Assembler, AssemblyJob, JobState};
pub use crate::fetch::{FetchOptions, FetcherHandle, FileFetcher, HttpFetcher};
