//! Bodega: a read-through caching proxy that serves a Berkshelf universe and
//! cookbook tarballs from a Chef Server.

mod cli;
mod error;
mod server;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use crate::server::AppState;
use bodega_assemble::FetchOptions;
use bodega_catalog::{Catalog, Poller};
use bodega_config::{Config, Loader};
use bodega_upstream::{ChefServer, UpstreamHandle};
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = Loader::new(cli.config.as_deref())
        .or_raise(|| ErrorKind::Config)?
        .env()
        .overrides(cli.overrides())
        .load()
        .or_raise(|| ErrorKind::Config)?;
    let upstream = upstream(&config)?;

    let catalog = Arc::new(Catalog::new(Arc::clone(&upstream), config.public_base_url.clone()));
    let mut poller = Poller::new(Arc::clone(&catalog), config.poll_interval());
    poller.start().or_raise(|| ErrorKind::Poller)?;

    let state = AppState {
        catalog,
        upstream,
        fetchers: server::http_fetchers(FetchOptions {
            skip_tls_verify: config.upstream.skip_tls_verify,
            timeout: config.fetch_timeout(),
        }),
    };
    let listener = TcpListener::bind(config.listen).await.or_raise(|| ErrorKind::Bind(config.listen.to_string()))?;
    tracing::info!(
        listen = %config.listen,
        upstream = %config.upstream.server_url,
        base_url = %config.public_base_url,
        "Serving"
    );
    let served = axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .or_raise(|| ErrorKind::Server);

    // Stop polling even when the server failed, so the last refresh finishes cleanly.
    poller.stop().await.or_raise(|| ErrorKind::Poller)?;
    served
}

fn upstream(config: &Config) -> Result<UpstreamHandle> {
    let chef = ChefServer::from_key_file(
        &config.upstream.server_url,
        config.upstream.client_name.clone(),
        &config.upstream.key_path,
        config.upstream.skip_tls_verify,
    )
    .or_raise(|| ErrorKind::Upstream)?;
    if config.upstream.skip_tls_verify {
        tracing::warn!("TLS certificate verification is disabled for upstream requests");
    }
    let chef: UpstreamHandle = Arc::new(chef);
    Ok(chef)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Couldn't listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "Couldn't listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutting down");
}
