//! Evaluation client kept in sync with a datafile manager.

use super::{ClientConfig, EvaluationClient, EventTags, UserAttributes};
use crate::core::{
    Datafile, DatafileManager, ManagerConfig, ManagerOptions, PollingDatafileManager,
    StaticDatafileManager,
};
use crate::error::{DatafileError, Result};
use crate::notify::{ListenerDisposer, Readiness, UpdateChannel};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Type alias for the client-construction strategy.
pub type ClientFactory<C> = Arc<dyn Fn(ClientConfig) -> C + Send + Sync>;

/// Type alias for the manager-construction strategy.
pub type ManagerFactory =
    Arc<dyn Fn(ManagerConfig) -> Result<Arc<dyn DatafileManager>> + Send + Sync>;

/// The active client and everything needed to replace it.
struct ClientSlot<C> {
    client: ArcSwap<C>,
    client_config: ClientConfig,
    create_instance: ClientFactory<C>,
    updates: UpdateChannel<()>,
    /// Set once by `close`; no client is installed afterwards
    closed: AtomicBool,
}

impl<C: EvaluationClient> ClientSlot<C> {
    /// Build a candidate from `datafile` and install it if valid.
    fn install(&self, datafile: &Arc<Datafile>) -> bool {
        if self.is_closed() {
            debug!(revision = ?datafile.revision(), "Ignoring datafile for closed client");
            return false;
        }

        let candidate = (self.create_instance)(self.client_config.merged_with(Arc::clone(datafile)));
        if !candidate.is_valid_instance() {
            warn!(
                revision = ?datafile.revision(),
                "Client built from datafile is not a valid instance, keeping current client"
            );
            return false;
        }

        let candidate = Arc::new(candidate);
        self.client.store(Arc::clone(&candidate));
        // `close` may have run between the check above and the store.
        if self.is_closed() {
            candidate.close();
            return false;
        }

        debug!(revision = ?datafile.revision(), "Installed client for new datafile");
        self.updates.emit(&());
        true
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.client.load().close();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn has_valid_client(&self) -> bool {
        self.client.load().is_valid_instance()
    }
}

/// The manager a client is bound to, and whether the client is responsible for stopping it.
struct ManagerBinding {
    manager: Arc<dyn DatafileManager>,
    owned: bool,
}

/// A feature-flag client that rebuilds itself whenever its datafile changes.
///
/// Every evaluation call is forwarded to the currently installed client. Until a
/// first valid client has been built, calls are answered by
/// [`EvaluationClient::invalid`]. A rebuilt client that reports itself invalid is
/// discarded and the previous one stays installed.
///
/// Construction never fails: a missing datafile source, an initial fetch failure, or
/// an invalid first client all surface through [`on_ready`](Self::on_ready).
///
/// # Examples
///
/// ```rust,ignore
/// use managed_datafile::prelude::*;
/// use std::time::Duration;
///
/// # async fn example() -> Result<()> {
/// let client = ManagedClient::builder(MyClient::from_config)
///     .with_sdk_key("my-sdk-key")
///     .build();
///
/// client.wait_ready(Duration::from_secs(5)).await?;
///
/// if client.is_feature_enabled("new_checkout", "user-123", None) {
///     println!("New checkout enabled");
/// }
///
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct ManagedClient<C> {
    slot: Arc<ClientSlot<C>>,
    manager: Option<ManagerBinding>,
    ready: Readiness<()>,
    update_disposer: Option<ListenerDisposer>,
}

impl<C: EvaluationClient> ManagedClient<C> {
    /// Create a new builder with the given client-construction strategy.
    pub fn builder<F>(create_instance: F) -> ManagedClientBuilder<C>
    where
        F: Fn(ClientConfig) -> C + Send + Sync + 'static,
    {
        ManagedClientBuilder::new(create_instance)
    }

    /// Readiness that resolves once a first valid client is installed.
    pub fn on_ready(&self) -> Readiness<()> {
        self.ready.clone()
    }

    /// Wait at most `timeout` for readiness.
    ///
    /// # Errors
    ///
    /// Returns the readiness failure, or [`DatafileError::TimeoutError`].
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        self.ready.wait_timeout(timeout).await
    }

    /// Register a listener fired each time a new client is installed.
    pub fn on_datafile_update<F>(&self, listener: F) -> ListenerDisposer
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.slot.updates.subscribe(move |_: &()| listener())
    }

    /// The datafile currently cached by the manager.
    pub fn datafile(&self) -> Option<Arc<Datafile>> {
        self.manager.as_ref().and_then(|binding| binding.manager.get())
    }

    /// The currently installed client.
    pub fn client(&self) -> Arc<C> {
        self.slot.client.load_full()
    }

    /// Stop background work and close the installed client.
    ///
    /// Disposes the update subscription and stops the manager if this client created
    /// it. A manager supplied through [`ManagedClientBuilder::with_manager`] is left
    /// running. No client is installed after close, and a still pending
    /// [`on_ready`](Self::on_ready) is rejected with [`DatafileError::ClosedError`].
    /// Later evaluation calls go to the last installed client.
    pub fn close(&self) {
        if let Some(disposer) = &self.update_disposer {
            disposer.dispose();
        }
        if let Some(binding) = &self.manager {
            if binding.owned {
                binding.manager.stop();
            }
        }
        self.slot.close();
        self.ready.reject(DatafileError::ClosedError);
    }

    /// See [`EvaluationClient::activate`].
    pub fn activate(
        &self,
        experiment_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<String> {
        self.slot.client.load().activate(experiment_key, user_id, attributes)
    }

    /// See [`EvaluationClient::get_variation`].
    pub fn get_variation(
        &self,
        experiment_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<String> {
        self.slot
            .client
            .load()
            .get_variation(experiment_key, user_id, attributes)
    }

    /// See [`EvaluationClient::track`].
    pub fn track(
        &self,
        event_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
        event_tags: Option<&EventTags>,
    ) {
        self.slot
            .client
            .load()
            .track(event_key, user_id, attributes, event_tags)
    }

    /// See [`EvaluationClient::is_feature_enabled`].
    pub fn is_feature_enabled(
        &self,
        feature_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> bool {
        self.slot
            .client
            .load()
            .is_feature_enabled(feature_key, user_id, attributes)
    }

    /// See [`EvaluationClient::get_enabled_features`].
    pub fn get_enabled_features(
        &self,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Vec<String> {
        self.slot.client.load().get_enabled_features(user_id, attributes)
    }

    /// See [`EvaluationClient::get_feature_variable_string`].
    pub fn get_feature_variable_string(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<String> {
        self.slot.client.load().get_feature_variable_string(
            feature_key,
            variable_key,
            user_id,
            attributes,
        )
    }

    /// See [`EvaluationClient::get_feature_variable_boolean`].
    pub fn get_feature_variable_boolean(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<bool> {
        self.slot.client.load().get_feature_variable_boolean(
            feature_key,
            variable_key,
            user_id,
            attributes,
        )
    }

    /// See [`EvaluationClient::get_feature_variable_integer`].
    pub fn get_feature_variable_integer(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<i64> {
        self.slot.client.load().get_feature_variable_integer(
            feature_key,
            variable_key,
            user_id,
            attributes,
        )
    }

    /// See [`EvaluationClient::get_feature_variable_double`].
    pub fn get_feature_variable_double(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<f64> {
        self.slot.client.load().get_feature_variable_double(
            feature_key,
            variable_key,
            user_id,
            attributes,
        )
    }

    /// See [`EvaluationClient::get_forced_variation`].
    pub fn get_forced_variation(&self, experiment_key: &str, user_id: &str) -> Option<String> {
        self.slot
            .client
            .load()
            .get_forced_variation(experiment_key, user_id)
    }

    /// See [`EvaluationClient::set_forced_variation`].
    pub fn set_forced_variation(
        &self,
        experiment_key: &str,
        user_id: &str,
        variation_key: Option<&str>,
    ) -> bool {
        self.slot
            .client
            .load()
            .set_forced_variation(experiment_key, user_id, variation_key)
    }

    /// See [`EvaluationClient::notification_center`].
    pub fn notification_center(&self) -> Option<C::NotificationCenter> {
        self.slot.client.load().notification_center()
    }

    /// See [`EvaluationClient::is_valid_instance`].
    pub fn is_valid_instance(&self) -> bool {
        self.slot.client.load().is_valid_instance()
    }
}

/// Builder for constructing a [`ManagedClient`].
///
/// The datafile source is chosen as follows:
/// - [`with_manager`](Self::with_manager): use that manager (not stopped on close)
/// - an SDK key: a manager from the factory (default [`PollingDatafileManager`]),
///   seeded with the datafile if one was also given
/// - only a datafile: a [`StaticDatafileManager`]
/// - neither: readiness is rejected with [`DatafileError::NoSourceError`]
pub struct ManagedClientBuilder<C> {
    create_instance: ClientFactory<C>,
    client_config: ClientConfig,
    sdk_key: Option<String>,
    datafile: Option<Arc<Datafile>>,
    manager_options: ManagerOptions,
    manager_factory: Option<ManagerFactory>,
    manager: Option<Arc<dyn DatafileManager>>,
}

impl<C: EvaluationClient> ManagedClientBuilder<C> {
    /// Create a new builder with the given client-construction strategy.
    pub fn new<F>(create_instance: F) -> Self
    where
        F: Fn(ClientConfig) -> C + Send + Sync + 'static,
    {
        Self {
            create_instance: Arc::new(create_instance),
            client_config: ClientConfig::new(),
            sdk_key: None,
            datafile: None,
            manager_options: ManagerOptions::default(),
            manager_factory: None,
            manager: None,
        }
    }

    /// Set the base client configuration merged with each datafile.
    pub fn with_client_config(mut self, client_config: ClientConfig) -> Self {
        self.client_config = client_config;
        self
    }

    /// Fetch and poll the datafile for `sdk_key`.
    pub fn with_sdk_key(mut self, sdk_key: impl Into<String>) -> Self {
        self.sdk_key = Some(sdk_key.into());
        self
    }

    /// Provide a datafile up front.
    pub fn with_datafile(mut self, datafile: impl Into<Arc<Datafile>>) -> Self {
        self.datafile = Some(datafile.into());
        self
    }

    /// Options for the default polling manager.
    pub fn with_manager_options(mut self, options: ManagerOptions) -> Self {
        self.manager_options = options;
        self
    }

    /// Replace the default manager-construction strategy.
    ///
    /// Managers produced by the factory are owned and stopped on close.
    pub fn with_manager_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(ManagerConfig) -> Result<Arc<dyn DatafileManager>> + Send + Sync + 'static,
    {
        self.manager_factory = Some(Arc::new(factory));
        self
    }

    /// Use an existing manager, which the client starts but never stops.
    pub fn with_manager(mut self, manager: Arc<dyn DatafileManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    fn bind_manager(&mut self) -> Result<ManagerBinding> {
        if let Some(manager) = self.manager.take() {
            return Ok(ManagerBinding {
                manager,
                owned: false,
            });
        }

        let manager: Arc<dyn DatafileManager> = match (self.sdk_key.take(), self.datafile.take()) {
            (Some(sdk_key), datafile) => {
                let config = ManagerConfig { sdk_key, datafile };
                match &self.manager_factory {
                    Some(factory) => factory(config)?,
                    None => {
                        let manager =
                            PollingDatafileManager::new(config, self.manager_options.clone())?;
                        Arc::new(manager)
                    }
                }
            }
            (None, Some(datafile)) => {
                let manager = StaticDatafileManager::new(datafile);
                Arc::new(manager)
            }
            (None, None) => return Err(DatafileError::NoSourceError),
        };

        Ok(ManagerBinding {
            manager,
            owned: true,
        })
    }

    /// Build the managed client.
    ///
    /// Must be called within a Tokio runtime when the manager has no datafile yet.
    pub fn build(mut self) -> ManagedClient<C> {
        let slot = Arc::new(ClientSlot {
            client: ArcSwap::from_pointee(C::invalid()),
            client_config: std::mem::take(&mut self.client_config),
            create_instance: Arc::clone(&self.create_instance),
            updates: UpdateChannel::new(),
            closed: AtomicBool::new(false),
        });

        let binding = match self.bind_manager() {
            Ok(binding) => binding,
            Err(err) => {
                warn!(error = %err, "Managed client has no datafile source");
                return ManagedClient {
                    slot,
                    manager: None,
                    ready: Readiness::rejected(err),
                    update_disposer: None,
                };
            }
        };

        // Subscribe before starting so no update emitted by `start` is missed.
        let listener_slot = Arc::clone(&slot);
        let update_disposer = binding.manager.on_update(Box::new(move |datafile: &Arc<Datafile>| {
            listener_slot.install(datafile);
        }));
        binding.manager.start();

        let ready = match binding.manager.get() {
            Some(datafile) => {
                if slot.install(&datafile) {
                    Readiness::resolved(())
                } else {
                    Readiness::rejected(DatafileError::InvalidClientError)
                }
            }
            None => {
                let ready = Readiness::pending();
                let manager_ready = binding.manager.on_ready();
                let task_slot = Arc::clone(&slot);
                let task_ready = ready.clone();
                tokio::spawn(async move {
                    match manager_ready.wait().await {
                        Ok(_) if task_slot.is_closed() => {
                            task_ready.reject(DatafileError::ClosedError);
                        }
                        // An update may already have installed a newer client.
                        Ok(datafile) => {
                            if task_slot.has_valid_client() || task_slot.install(&datafile) {
                                task_ready.resolve(());
                            } else if task_slot.is_closed() {
                                task_ready.reject(DatafileError::ClosedError);
                            } else {
                                task_ready.reject(DatafileError::InvalidClientError);
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "Datafile manager failed to become ready");
                            task_ready.reject(err);
                        }
                    }
                });
                ready
            }
        };

        ManagedClient {
            slot,
            manager: Some(binding),
            ready,
            update_disposer: Some(update_disposer),
        }
    }
}
