//! Configuration for the proxy.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a config file (`bodega.toml`, `bodega.yaml` or `bodega.json` in the
//!    platform config directory, or one explicit path),
//! 3. `BODEGA_`-prefixed environment variables, with `__` separating nested
//!    keys (`BODEGA_UPSTREAM__SERVER_URL`),
//! 4. command-line overrides.
//!
//! See [`Loader`].

pub mod error;
mod loader;

use crate::error::{ErrorKind, Result};
pub use crate::loader::{ENV_PREFIX, Loader};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Externally reachable URL of this proxy; download locations in the
    /// universe are built from it.
    pub public_base_url: String,
    pub upstream: UpstreamConfig,
    /// Seconds between catalog refreshes.
    pub poll_interval_secs: u64,
    /// Per-file download deadline in seconds. Unset means no deadline.
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_base_url: "http://localhost:8080".to_string(),
            upstream: UpstreamConfig::default(),
            poll_interval_secs: 300,
            fetch_timeout_secs: None,
        }
    }
}

/// The Chef Server being proxied, and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Chef Server URL, including the organization path if any.
    pub server_url: String,
    /// API client name requests are signed as.
    pub client_name: String,
    /// PEM file holding the client's RSA private key.
    pub key_path: PathBuf,
    /// Accept any TLS certificate from upstream and its download URLs.
    pub skip_tls_verify: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            client_name: String::new(),
            key_path: PathBuf::new(),
            // Self-signed Chef Servers are the norm rather than the exception.
            skip_tls_verify: true,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// Reject configurations the proxy can't run with.
    pub fn validate(&self) -> Result<()> {
        validate_http_url("upstream.server_url", &self.upstream.server_url)?;
        validate_http_url("public_base_url", &self.public_base_url)?;
        if self.upstream.client_name.trim().is_empty() {
            exn::bail!(ErrorKind::invalid("upstream.client_name", "must not be empty"));
        }
        if self.upstream.key_path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::invalid("upstream.key_path", "must not be empty"));
        }
        if self.poll_interval_secs == 0 {
            exn::bail!(ErrorKind::invalid("poll_interval_secs", "must be greater than zero"));
        }
        if self.fetch_timeout_secs == Some(0) {
            exn::bail!(ErrorKind::invalid("fetch_timeout_secs", "must be greater than zero when set"));
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        exn::bail!(ErrorKind::invalid(field, "must not be empty"));
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => exn::bail!(ErrorKind::invalid(field, format!("unsupported scheme {:?}", url.scheme()))),
        Err(err) => exn::bail!(ErrorKind::invalid(field, err.to_string())),
    }
}
