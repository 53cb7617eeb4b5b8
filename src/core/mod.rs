//! Core datafile management types.

mod datafile;
mod manager;
mod polling;
mod static_manager;

#[cfg(feature = "settings")]
mod settings;

pub use datafile::Datafile;
pub use manager::{
    DEFAULT_POLLING_INTERVAL, DatafileListener, DatafileManager, ManagerConfig, ManagerOptions,
    ManagerStatus,
};
pub use polling::PollingDatafileManager;
pub use static_manager::StaticDatafileManager;

#[cfg(feature = "settings")]
pub use settings::{DatafileSettings, SDK_KEY_PLACEHOLDER};
