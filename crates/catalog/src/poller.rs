use crate::catalog::{Catalog, RefreshOutcome};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

enum State {
    Idle,
    Polling { stop: watch::Sender<bool>, task: JoinHandle<()> },
    Stopped,
}

/// Keeps a [`Catalog`] fresh by refreshing it on a fixed interval.
///
/// A poller runs once: `Idle → Polling → Stopped`. There is no restart.
///
/// # Examples
///
/// ```no_run
/// use bodega_catalog::{Catalog, Poller};
/// use bodega_upstream::UpstreamHandle;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(upstream: UpstreamHandle) -> bodega_catalog::error::Result<()> {
/// let catalog = Arc::new(Catalog::new(upstream, "http://localhost:8080"));
/// let mut poller = Poller::new(Arc::clone(&catalog), Duration::from_secs(300));
/// poller.start()?;
/// // ... serve requests from `catalog.snapshot()` ...
/// poller.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct Poller {
    catalog: Arc<Catalog>,
    interval: Duration,
    state: State,
}

impl Poller {
    pub fn new(catalog: Arc<Catalog>, interval: Duration) -> Self {
        Self { catalog, interval, state: State::Idle }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.state, State::Polling { .. })
    }

    /// Spawn the polling task onto the current Tokio runtime.
    ///
    /// The first refresh happens immediately, then one per `interval`. When a
    /// refresh overruns the interval, the next tick is pushed back rather than
    /// fired in a burst to catch up.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.state, State::Idle) {
            exn::bail!(ErrorKind::AlreadyStarted);
        }
        if self.interval.is_zero() {
            exn::bail!(ErrorKind::InvalidInterval);
        }
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(poll(Arc::clone(&self.catalog), self.interval, stopped));
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Poller started");
        self.state = State::Polling { stop, task };
        Ok(())
    }

    /// Signal the polling task and wait for it to exit.
    ///
    /// The signal is checked between cycles, so an in-flight refresh runs to
    /// completion (and installs its snapshot) before this returns.
    pub async fn stop(&mut self) -> Result<()> {
        let (stop, task) = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Polling { stop, task } => (stop, task),
            other => {
                self.state = other;
                exn::bail!(ErrorKind::NotPolling);
            },
        };
        // Fails only if the task already exited, which is fine.
        let _ = stop.send(true);
        task.await.or_raise(|| ErrorKind::Task)?;
        tracing::info!("Poller stopped");
        Ok(())
    }
}

async fn poll(catalog: Arc<Catalog>, period: Duration, mut stopped: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            // Also fires if the poller was dropped without being stopped.
            _ = stopped.changed() => break,
            _ = ticker.tick() => {},
        }
        match catalog.refresh().await {
            Ok(RefreshOutcome::Refreshed(_)) => {},
            Ok(RefreshOutcome::Coalesced) => tracing::debug!("Scheduled refresh coalesced"),
            Err(err) => tracing::warn!(error = ?err, "Refresh failed; serving previous snapshot"),
        }
    }
}
