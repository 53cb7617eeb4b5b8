//! The datafile manager capability and its construction inputs.

use crate::core::Datafile;
use crate::error::Result;
use crate::notify::{ListenerDisposer, Readiness};
use crate::sources::{DatafileSource, ReqwestTransport, Transport, UrlBuilder};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with each datafile delivered by a manager update.
pub type DatafileListener = Box<dyn Fn(&Arc<Datafile>) + Send + Sync>;

/// Default interval between polls.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(5000);

/// Owns fetch, cache and refresh of a datafile.
///
/// Implemented by [`PollingDatafileManager`](crate::core::PollingDatafileManager)
/// and [`StaticDatafileManager`](crate::core::StaticDatafileManager); consumed by
/// [`ManagedClient`](crate::client::ManagedClient).
pub trait DatafileManager: Send + Sync {
    /// The cached datafile, if one has been obtained. Never blocks.
    fn get(&self) -> Option<Arc<Datafile>>;

    /// Readiness that settles once with the first datafile obtained.
    fn on_ready(&self) -> Readiness<Arc<Datafile>>;

    /// Register a listener for datafiles obtained after the one that resolved readiness.
    fn on_update(&self, listener: DatafileListener) -> ListenerDisposer;

    /// Begin periodic refresh. Idempotent.
    fn start(&self);

    /// Stop periodic refresh permanently. Idempotent.
    fn stop(&self);
}

/// Lifecycle state of a polling manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerStatus {
    /// Constructed, not yet started.
    Initial,
    /// Polling (or about to poll once the initial fetch settles).
    Started,
    /// Stopped for good.
    Stopped,
}

/// What a manager factory receives from a managed client.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Key identifying the datafile to fetch
    pub sdk_key: String,
    /// Optional document to serve before the first fetch completes
    pub datafile: Option<Arc<Datafile>>,
}

impl ManagerConfig {
    /// Create a config for `sdk_key` with no seed datafile.
    pub fn new(sdk_key: impl Into<String>) -> Self {
        Self {
            sdk_key: sdk_key.into(),
            datafile: None,
        }
    }

    /// Seed the manager with a datafile.
    pub fn with_datafile(mut self, datafile: Arc<Datafile>) -> Self {
        self.datafile = Some(datafile);
        self
    }
}

/// How a polling manager fetches and how often.
///
/// # Examples
///
/// ```rust,no_run
/// use managed_datafile::core::ManagerOptions;
/// use managed_datafile::sources::UrlBuilder;
/// use std::time::Duration;
///
/// let options = ManagerOptions::new()
///     .with_url_builder(UrlBuilder::from_template("https://cdn.example.com/{sdk_key}.json"))
///     .with_polling_interval(Duration::from_secs(30));
/// ```
#[derive(Clone)]
pub struct ManagerOptions {
    url_builder: UrlBuilder,
    polling_interval: Duration,
    transport: Option<Arc<dyn Transport>>,
}

impl ManagerOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            url_builder: UrlBuilder::default(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            transport: None,
        }
    }

    /// Set the URL-building strategy.
    pub fn with_url_builder(mut self, url_builder: UrlBuilder) -> Self {
        self.url_builder = url_builder;
        self
    }

    /// Set the polling interval.
    ///
    /// Default is 5 seconds.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Set the transport used for fetches.
    ///
    /// Default is a [`ReqwestTransport`] with a 10 second timeout.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The configured polling interval.
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Build the datafile source these options describe.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP transport cannot be constructed.
    pub fn source(&self) -> Result<DatafileSource> {
        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(ReqwestTransport::builder().build()?),
        };
        Ok(DatafileSource::new(transport, self.url_builder.clone()))
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("url_builder", &self.url_builder)
            .field("polling_interval", &self.polling_interval)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}
