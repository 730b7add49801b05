//! Startup and serving errors for the binary.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    /// Usually bad client credentials.
    #[display("couldn't set up the upstream client")]
    Upstream,
    #[display("catalog poller error")]
    Poller,
    #[display("couldn't listen on {_0}")]
    Bind(#[error(not(source))] String),
    #[display("HTTP server error")]
    Server,
}
