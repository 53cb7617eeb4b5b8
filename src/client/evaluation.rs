//! The evaluation client capability consumed by [`ManagedClient`](super::ManagedClient).

use crate::core::Datafile;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Attributes describing a user for targeting.
pub type UserAttributes = Map<String, Value>;

/// Free-form tags attached to a tracked event.
pub type EventTags = Map<String, Value>;

/// A feature-flag evaluation client built from a single datafile.
///
/// The evaluation rules themselves are out of scope for this crate; a managed
/// client only builds instances, checks [`is_valid_instance`](Self::is_valid_instance)
/// and forwards calls.
pub trait EvaluationClient: Send + Sync + 'static {
    /// Handle to the client's notification center.
    type NotificationCenter: Clone + Send + Sync;

    /// A placeholder instance answering every call with its invalid-instance defaults.
    ///
    /// Installed until the first valid client is built.
    fn invalid() -> Self
    where
        Self: Sized;

    /// Whether this instance was built from a usable datafile.
    fn is_valid_instance(&self) -> bool;

    /// Activate an experiment for a user, returning the variation key.
    fn activate(
        &self,
        experiment_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<String>;

    /// Get the variation a user would see, without activating.
    fn get_variation(
        &self,
        experiment_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<String>;

    /// Track a conversion event.
    fn track(
        &self,
        event_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
        event_tags: Option<&EventTags>,
    );

    /// Whether a feature is enabled for a user.
    fn is_feature_enabled(
        &self,
        feature_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> bool;

    /// All features enabled for a user.
    fn get_enabled_features(&self, user_id: &str, attributes: Option<&UserAttributes>)
    -> Vec<String>;

    /// String value of a feature variable.
    fn get_feature_variable_string(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<String>;

    /// Boolean value of a feature variable.
    fn get_feature_variable_boolean(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<bool>;

    /// Integer value of a feature variable.
    fn get_feature_variable_integer(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<i64>;

    /// Double value of a feature variable.
    fn get_feature_variable_double(
        &self,
        feature_key: &str,
        variable_key: &str,
        user_id: &str,
        attributes: Option<&UserAttributes>,
    ) -> Option<f64>;

    /// The variation forced for a user, if any.
    fn get_forced_variation(&self, experiment_key: &str, user_id: &str) -> Option<String>;

    /// Force (or with `None`, clear) a user's variation. Returns whether it was applied.
    fn set_forced_variation(
        &self,
        experiment_key: &str,
        user_id: &str,
        variation_key: Option<&str>,
    ) -> bool;

    /// The client's notification center, if it has one.
    fn notification_center(&self) -> Option<Self::NotificationCenter>;

    /// Release the client's resources.
    fn close(&self);
}

/// Base configuration handed to the client-construction strategy.
///
/// Each build receives its own copy with the datafile merged in; no configuration
/// object is shared between builds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    /// Client settings passed through untouched
    pub settings: Map<String, Value>,
    /// The datafile to build from
    pub datafile: Option<Arc<Datafile>>,
}

impl ClientConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pass-through setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// A copy of this configuration carrying `datafile`.
    pub fn merged_with(&self, datafile: Arc<Datafile>) -> Self {
        Self {
            settings: self.settings.clone(),
            datafile: Some(datafile),
        }
    }
}
