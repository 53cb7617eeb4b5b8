//! One fetch-and-parse cycle for a remote datafile.

use super::Transport;
use crate::core::Datafile;
use crate::error::{DatafileError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds the datafile URL for an SDK key.
///
/// The default produces `https://cdn.optimizely.com/datafiles/<key>.json`.
///
/// # Examples
///
/// ```rust
/// use managed_datafile::sources::UrlBuilder;
///
/// let default = UrlBuilder::default();
/// assert_eq!(default.build("abc"), "https://cdn.optimizely.com/datafiles/abc.json");
///
/// let custom = UrlBuilder::new(|key| format!("https://mirror.internal/{key}"));
/// assert_eq!(custom.build("abc"), "https://mirror.internal/abc");
/// ```
#[derive(Clone)]
pub struct UrlBuilder(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl UrlBuilder {
    /// Default CDN host for datafiles.
    pub const DEFAULT_CDN_HOST: &'static str = "https://cdn.optimizely.com";

    /// Wrap a URL-building function.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(build))
    }

    /// Build from a template containing the `{sdk_key}` placeholder.
    pub fn from_template(template: impl Into<String>) -> Self {
        let template = template.into();
        Self::new(move |key| template.replace("{sdk_key}", key))
    }

    /// Produce the URL for `sdk_key`.
    pub fn build(&self, sdk_key: &str) -> String {
        (self.0)(sdk_key)
    }
}

impl Default for UrlBuilder {
    fn default() -> Self {
        Self::new(|key| format!("{}/datafiles/{}.json", Self::DEFAULT_CDN_HOST, key))
    }
}

impl fmt::Debug for UrlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UrlBuilder(..)")
    }
}

/// Fetches and parses datafiles over a [`Transport`].
///
/// No retries happen here; a failed fetch is reported to the caller, and the
/// polling manager simply tries again on its next tick.
#[derive(Clone)]
pub struct DatafileSource {
    transport: Arc<dyn Transport>,
    url_builder: UrlBuilder,
}

impl DatafileSource {
    /// Create a source from a transport and URL strategy.
    pub fn new(transport: Arc<dyn Transport>, url_builder: UrlBuilder) -> Self {
        Self {
            transport,
            url_builder,
        }
    }

    /// The URL that would be requested for `sdk_key`.
    pub fn url_for(&self, sdk_key: &str) -> String {
        self.url_builder.build(sdk_key)
    }

    /// Fetch the datafile for `sdk_key`.
    ///
    /// # Errors
    ///
    /// - [`DatafileError::TransportError`] if no response was obtained
    /// - [`DatafileError::ResponseError`] if the status is 400 or above
    /// - [`DatafileError::ParseError`] if the body is not a JSON object
    pub async fn fetch_document(&self, sdk_key: &str) -> Result<Arc<Datafile>> {
        let url = self.url_for(sdk_key);
        let response = self.transport.get(&url).await?;

        if response.status >= 400 {
            return Err(DatafileError::ResponseError {
                url,
                status: response.status,
            });
        }

        let datafile = Datafile::from_json(&response.body).map_err(|e| {
            DatafileError::ParseError {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!(%url, revision = ?datafile.revision(), "Fetched datafile");
        Ok(Arc::new(datafile))
    }
}

impl fmt::Debug for DatafileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatafileSource")
            .field("url_builder", &self.url_builder)
            .finish_non_exhaustive()
    }
}
