//! # managed-datafile
//!
//! Live, locally cached feature-flag datafiles with hot-swapped evaluation clients.
//!
//! ## Overview
//!
//! `managed-datafile` keeps a remote configuration document ("datafile") fresh and
//! keeps a feature-flag client built from it in sync:
//! - A [`PollingDatafileManager`](core::PollingDatafileManager) fetches the datafile
//!   once at construction, caches it, and refreshes it on an interval once started
//! - A [`StaticDatafileManager`](core::StaticDatafileManager) serves a datafile known up front
//! - A [`ManagedClient`](client::ManagedClient) rebuilds its inner client on every new
//!   datafile and swaps it in atomically using `arc-swap`, keeping the previous client
//!   whenever a rebuilt one is invalid
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use managed_datafile::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<()> {
//! // `MyClient` implements `EvaluationClient`
//! let client = ManagedClient::builder(MyClient::from_config)
//!     .with_sdk_key("my-sdk-key")
//!     .build();
//!
//! client.wait_ready(Duration::from_secs(5)).await?;
//!
//! // Reads go to whichever client is installed right now
//! let enabled = client.is_feature_enabled("new_checkout", "user-123", None);
//!
//! let _disposer = client.on_datafile_update(|| println!("Datafile updated"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fetch failures never escape background tasks. During polling they are logged and
//! retried on the next tick; for the initial fetch they reject the readiness signal.
//! See [`error::DatafileError`].
//!
//! ## Logging
//!
//! The crate logs through [`tracing`](https://docs.rs/tracing) and never installs a
//! subscriber itself.
//!
//! ## Feature Flags
//!
//! - `settings` (default): load [`DatafileSettings`](core::DatafileSettings) from
//!   files and environment variables with the `config` crate

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod client;
pub mod core;
pub mod error;
pub mod notify;
pub mod sources;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::client::{ClientConfig, EvaluationClient, ManagedClient, ManagedClientBuilder};
    pub use crate::core::{
        Datafile, DatafileManager, ManagerConfig, ManagerOptions, ManagerStatus,
        PollingDatafileManager, StaticDatafileManager,
    };
    pub use crate::error::{DatafileError, Result};
    pub use crate::notify::{ListenerDisposer, Readiness};

    #[cfg(feature = "settings")]
    pub use crate::core::DatafileSettings;
}
