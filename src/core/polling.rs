//! Live datafile manager: initial fetch, cache, and periodic refresh.

use crate::core::{
    DEFAULT_POLLING_INTERVAL, Datafile, DatafileListener, DatafileManager, ManagerConfig,
    ManagerOptions, ManagerStatus,
};
use crate::error::Result;
use crate::notify::{ListenerDisposer, Readiness, UpdateChannel};
use crate::sources::DatafileSource;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shared state between the manager handle and its background tasks.
struct ManagerInner {
    sdk_key: String,
    source: DatafileSource,
    polling_interval: Duration,
    /// Most recent successfully fetched datafile
    current: ArcSwapOption<Datafile>,
    /// Settles with the first datafile (or the initial fetch failure)
    ready: Readiness<Arc<Datafile>>,
    /// Settles when the construction-time fetch completes, whatever its outcome
    initial_fetch: Readiness<()>,
    updates: UpdateChannel<Arc<Datafile>>,
    status: watch::Sender<ManagerStatus>,
}

impl ManagerInner {
    fn status(&self) -> ManagerStatus {
        *self.status.borrow()
    }

    async fn run_initial_fetch(&self) {
        match self.source.fetch_document(&self.sdk_key).await {
            Ok(datafile) if self.ready.is_settled() => {
                // Readiness was resolved by a seed datafile, so this is the first update.
                // It is held until `start` so listeners registered before starting see it.
                if self.wait_while_initial().await == ManagerStatus::Started {
                    self.current.store(Some(Arc::clone(&datafile)));
                    self.updates.emit(&datafile);
                } else {
                    debug!(sdk_key = %self.sdk_key, "Discarding initial datafile fetched after stop");
                }
            }
            Ok(datafile) => {
                info!(
                    sdk_key = %self.sdk_key,
                    revision = ?datafile.revision(),
                    "Initial datafile fetched"
                );
                self.current.store(Some(Arc::clone(&datafile)));
                self.ready.resolve(datafile);
            }
            Err(err) => {
                warn!(sdk_key = %self.sdk_key, error = %err, "Initial datafile fetch failed");
                self.ready.reject(err);
            }
        }
        self.initial_fetch.resolve(());
    }

    /// Wait until the manager leaves `Initial` and return the new status.
    async fn wait_while_initial(&self) -> ManagerStatus {
        let mut status = self.status.subscribe();
        match status.wait_for(|s| *s != ManagerStatus::Initial).await {
            Ok(current) => *current,
            Err(_) => ManagerStatus::Stopped,
        }
    }

    async fn run_polling(&self) {
        let mut status = self.status.subscribe();
        if *status.borrow_and_update() != ManagerStatus::Started {
            return;
        }

        tokio::select! {
            _ = self.initial_fetch.wait() => {}
            _ = status.changed() => {}
        }
        if *status.borrow_and_update() != ManagerStatus::Started {
            return;
        }

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.polling_interval, self.polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(sdk_key = %self.sdk_key, interval = ?self.polling_interval, "Polling started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = status.changed() => {}
            }
            if *status.borrow_and_update() != ManagerStatus::Started {
                break;
            }

            // In-flight fetches are never cancelled; the status is re-checked once they settle.
            match self.source.fetch_document(&self.sdk_key).await {
                Ok(datafile) => {
                    if self.status() != ManagerStatus::Started {
                        debug!(sdk_key = %self.sdk_key, "Discarding datafile fetched after stop");
                        break;
                    }
                    debug!(
                        sdk_key = %self.sdk_key,
                        revision = ?datafile.revision(),
                        "Datafile refreshed"
                    );
                    self.current.store(Some(Arc::clone(&datafile)));
                    self.updates.emit(&datafile);
                }
                Err(err) => {
                    warn!(sdk_key = %self.sdk_key, error = %err, "Datafile poll failed, retrying next tick");
                }
            }
        }

        debug!(sdk_key = %self.sdk_key, "Polling stopped");
    }
}

/// Datafile manager that fetches from a remote source and refreshes on an interval.
///
/// The initial fetch is issued at construction. [`start`](DatafileManager::start)
/// begins polling one interval after that fetch settles; [`stop`](DatafileManager::stop)
/// ends polling for good. A fetch that is in flight when the manager stops is allowed
/// to finish, but its result is neither cached nor emitted.
///
/// When seeded with a datafile, readiness resolves with the seed and the initial fetch
/// becomes the first update, delivered once the manager is started.
///
/// Dropping the manager stops it.
///
/// Must be constructed within a Tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use managed_datafile::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<()> {
/// let manager = PollingDatafileManager::new(
///     ManagerConfig::new("my-sdk-key"),
///     ManagerOptions::default(),
/// )?;
/// manager.start();
///
/// let datafile = manager.on_ready().wait().await?;
/// println!("revision: {:?}", datafile.revision());
///
/// let _disposer = manager.on_update(Box::new(|datafile: &Arc<Datafile>| {
///     println!("new revision: {:?}", datafile.revision());
/// }));
/// # Ok(())
/// # }
/// ```
pub struct PollingDatafileManager {
    inner: Arc<ManagerInner>,
}

impl PollingDatafileManager {
    /// Create a manager from options and immediately issue the initial fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP transport cannot be constructed.
    /// Fetch failures are never returned here; they reject [`on_ready`](DatafileManager::on_ready).
    pub fn new(config: ManagerConfig, options: ManagerOptions) -> Result<Self> {
        let source = options.source()?;
        Ok(Self::with_source(config, source, options.polling_interval()))
    }

    /// Create a manager over an existing source and immediately issue the initial fetch.
    ///
    /// A zero `polling_interval` is replaced by [`DEFAULT_POLLING_INTERVAL`].
    pub fn with_source(
        config: ManagerConfig,
        source: DatafileSource,
        polling_interval: Duration,
    ) -> Self {
        let ManagerConfig { sdk_key, datafile } = config;

        let polling_interval = if polling_interval.is_zero() {
            warn!(
                sdk_key = %sdk_key,
                default = ?DEFAULT_POLLING_INTERVAL,
                "Polling interval must be non-zero, using default"
            );
            DEFAULT_POLLING_INTERVAL
        } else {
            polling_interval
        };

        let ready = match &datafile {
            Some(seed) => Readiness::resolved(Arc::clone(seed)),
            None => Readiness::pending(),
        };
        let (status, _) = watch::channel(ManagerStatus::Initial);

        let inner = Arc::new(ManagerInner {
            sdk_key,
            source,
            polling_interval,
            current: ArcSwapOption::new(datafile),
            ready,
            initial_fetch: Readiness::pending(),
            updates: UpdateChannel::new(),
            status,
        });

        let task_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            task_inner.run_initial_fetch().await;
        });

        Self { inner }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ManagerStatus {
        self.inner.status()
    }

    /// The SDK key this manager fetches for.
    pub fn sdk_key(&self) -> &str {
        &self.inner.sdk_key
    }
}

impl DatafileManager for PollingDatafileManager {
    fn get(&self) -> Option<Arc<Datafile>> {
        self.inner.current.load_full()
    }

    fn on_ready(&self) -> Readiness<Arc<Datafile>> {
        self.inner.ready.clone()
    }

    fn on_update(&self, listener: DatafileListener) -> ListenerDisposer {
        self.inner.updates.subscribe_arc(Arc::from(listener))
    }

    /// Move from `Initial` to `Started` and spawn the polling task.
    ///
    /// `Stopped` is terminal: calling `start` after [`stop`](DatafileManager::stop)
    /// is ignored rather than resuming polling. Create a new manager instead.
    fn start(&self) {
        let started = self.inner.status.send_if_modified(|status| {
            if *status == ManagerStatus::Initial {
                *status = ManagerStatus::Started;
                true
            } else {
                false
            }
        });
        if !started {
            debug!(sdk_key = %self.inner.sdk_key, status = ?self.status(), "Ignoring start");
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_polling().await;
        });
    }

    fn stop(&self) {
        let previous = self.inner.status.send_replace(ManagerStatus::Stopped);
        if previous != ManagerStatus::Stopped {
            debug!(sdk_key = %self.inner.sdk_key, "Datafile manager stopped");
        }
    }
}

impl Drop for PollingDatafileManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PollingDatafileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingDatafileManager")
            .field("sdk_key", &self.inner.sdk_key)
            .field("status", &self.status())
            .field("polling_interval", &self.inner.polling_interval)
            .finish()
    }
}
