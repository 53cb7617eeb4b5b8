//! File and environment settings for datafile managers.

use crate::core::ManagerOptions;
use crate::error::{DatafileError, Result};
use crate::sources::{ReqwestTransport, UrlBuilder};
use config::{Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Placeholder substituted with the SDK key in `url_template`.
pub const SDK_KEY_PLACEHOLDER: &str = "{sdk_key}";

fn default_polling_interval_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Declarative settings for a datafile manager.
///
/// Loaded from an optional file (YAML, TOML or JSON, detected by extension)
/// overlaid by environment variables, which take precedence.
///
/// | Key | Env (prefix `DATAFILE`) | Default |
/// |---|---|---|
/// | `sdk_key` | `DATAFILE_SDK_KEY` | none |
/// | `url_template` | `DATAFILE_URL_TEMPLATE` | CDN URL |
/// | `polling_interval_ms` | `DATAFILE_POLLING_INTERVAL_MS` | 5000 |
/// | `request_timeout_ms` | `DATAFILE_REQUEST_TIMEOUT_MS` | 10000 |
///
/// # Examples
///
/// ```rust,no_run
/// use managed_datafile::core::DatafileSettings;
///
/// # fn example() -> managed_datafile::error::Result<()> {
/// let settings = DatafileSettings::load(Some("config/datafile.yaml"), "DATAFILE")?;
/// let options = settings.manager_options()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatafileSettings {
    /// Key identifying the datafile to fetch
    #[serde(default)]
    pub sdk_key: Option<String>,
    /// URL template containing `{sdk_key}`
    #[serde(default)]
    pub url_template: Option<String>,
    /// Interval between polls, in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Per-request timeout, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl DatafileSettings {
    /// Load settings from an optional file and `<env_prefix>_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`DatafileError::SettingsError`] if the file is missing or unreadable,
    /// a value has the wrong type, or the result fails [`validate`](Self::validate).
    pub fn load(path: Option<impl AsRef<Path>>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let path = path.as_ref();
            if !path.exists() {
                return Err(DatafileError::SettingsError(format!(
                    "Settings file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let settings: Self = builder
            .build()
            .map_err(|e| DatafileError::SettingsError(format!("Failed to load settings: {}", e)))?
            .try_deserialize()
            .map_err(|e| {
                DatafileError::SettingsError(format!("Failed to deserialize settings: {}", e))
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check value constraints.
    ///
    /// # Errors
    ///
    /// Returns [`DatafileError::SettingsError`] if the polling interval is zero or
    /// the URL template lacks the `{sdk_key}` placeholder.
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval_ms == 0 {
            return Err(DatafileError::SettingsError(
                "polling_interval_ms must be greater than 0".to_string(),
            ));
        }
        if let Some(template) = &self.url_template {
            if !template.contains(SDK_KEY_PLACEHOLDER) {
                return Err(DatafileError::SettingsError(format!(
                    "url_template must contain {}",
                    SDK_KEY_PLACEHOLDER
                )));
            }
        }
        Ok(())
    }

    /// Interval between polls.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Convert into manager options with a `reqwest` transport using the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn manager_options(&self) -> Result<ManagerOptions> {
        let transport = ReqwestTransport::builder()
            .with_timeout(Duration::from_millis(self.request_timeout_ms))
            .build()?;

        let mut options = ManagerOptions::new()
            .with_polling_interval(self.polling_interval())
            .with_transport(Arc::new(transport));
        if let Some(template) = &self.url_template {
            options = options.with_url_builder(UrlBuilder::from_template(template.clone()));
        }
        Ok(options)
    }
}

impl Default for DatafileSettings {
    fn default() -> Self {
        Self {
            sdk_key: None,
            url_template: None,
            polling_interval_ms: default_polling_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
