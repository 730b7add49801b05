use super::error::{ErrorKind, Result};
use super::{FileFetcher, redact};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("bodega/", env!("CARGO_PKG_VERSION"));

/// Knobs for [`HttpFetcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Accept any certificate. Download URLs usually point at the same
    /// (possibly self-signed) host as the Chef Server API.
    pub skip_tls_verify: bool,
    /// Per-request deadline covering connect, headers and body. `None` waits
    /// indefinitely.
    pub timeout: Option<Duration>,
}

/// Plain `GET` over reqwest. Build one per artifact; nothing is shared
/// between requests.
#[derive(Debug)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT).danger_accept_invalid_certs(options.skip_tls_verify);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().or_raise(|| ErrorKind::Client)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl FileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let shown = redact(url);
        let response = self.http.get(url).send().await.or_raise(|| ErrorKind::Transport(shown.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status { status: status.as_u16(), url: shown.to_string() });
        }
        let body = response.bytes().await.or_raise(|| ErrorKind::Body(shown.to_string()))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builds_with_every_option() {
        assert!(HttpFetcher::new(FetchOptions::default()).is_ok());
        let options = FetchOptions { skip_tls_verify: true, timeout: Some(Duration::from_secs(30)) };
        assert!(HttpFetcher::new(options).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let fetcher = HttpFetcher::new(FetchOptions { timeout: Some(Duration::from_secs(5)), ..Default::default() }).unwrap();
        // Port 9 on loopback ("discard") is closed on any sane test machine.
        let err = fetcher.fetch("http://127.0.0.1:9/cookbook?signature=secret").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Transport("http://127.0.0.1:9/cookbook".to_string()));
        assert!(err.is_retryable());
    }
}
