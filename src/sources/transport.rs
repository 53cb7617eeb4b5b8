//! HTTP transport used to fetch datafiles.

use crate::error::{DatafileError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Status and body of a completed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl TransportResponse {
    /// Create a response with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs a single GET request.
///
/// Implementations report any response the server produced, whatever its status;
/// only failures to obtain a response at all are errors, and those should be
/// [`DatafileError::TransportError`]. Timeouts are the transport's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request for `url`.
    async fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// [`Transport`] backed by a `reqwest` client.
///
/// # Examples
///
/// ```rust,no_run
/// use managed_datafile::sources::ReqwestTransport;
/// use std::time::Duration;
///
/// # fn example() -> managed_datafile::error::Result<()> {
/// let transport = ReqwestTransport::builder()
///     .with_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new builder for constructing a transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Wrap an existing `reqwest` client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let transport_error = |e: reqwest::Error| DatafileError::TransportError {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        Ok(TransportResponse { status, body })
    }
}

/// Builder for constructing a [`ReqwestTransport`].
pub struct ReqwestTransportBuilder {
    timeout: Duration,
}

impl ReqwestTransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the request timeout.
    ///
    /// Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ReqwestTransport> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DatafileError::TransportError {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(ReqwestTransport { client })
    }
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
