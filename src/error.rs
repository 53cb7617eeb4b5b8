//! Error types for managed-datafile.

use std::time::Duration;

/// Result type alias for managed-datafile operations.
pub type Result<T> = std::result::Result<T, DatafileError>;

/// Errors that can occur while obtaining a datafile or building a managed client.
///
/// The error is `Clone` so that a single settled [`Readiness`](crate::notify::Readiness)
/// can hand the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatafileError {
    /// The request never produced a response (network unreachable, timeout, body read failure).
    #[error("Datafile request to {url} failed: {reason}")]
    TransportError {
        /// URL that was requested
        url: String,
        /// Description of the transport failure
        reason: String,
    },

    /// The server answered with a client or server error status.
    #[error("Datafile response error from {url}: HTTP {status}")]
    ResponseError {
        /// URL that was requested
        url: String,
        /// HTTP status code (always >= 400)
        status: u16,
    },

    /// The response body was not a JSON object.
    #[error("Datafile parse error for {url}: {reason}")]
    ParseError {
        /// URL that was requested
        url: String,
        /// Description of the parse failure
        reason: String,
    },

    /// A managed client was constructed with neither an SDK key nor a datafile.
    #[error("No SDK key or datafile provided")]
    NoSourceError,

    /// The client built from the first datafile reported itself invalid.
    #[error("Client built from datafile is not a valid instance")]
    InvalidClientError,

    /// The managed client was closed before it became ready.
    #[error("Managed client closed before becoming ready")]
    ClosedError,

    /// Readiness did not settle within the requested time.
    #[error("Timed out after {0:?} waiting for readiness")]
    TimeoutError(Duration),

    /// Settings could not be loaded or were rejected.
    #[error("Failed to load settings: {0}")]
    SettingsError(String),
}

impl DatafileError {
    /// Returns true for failures of a single fetch attempt, which polling absorbs and retries.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::TransportError { .. } | Self::ResponseError { .. } | Self::ParseError { .. }
        )
    }
}
