//! Change notification primitives.
//!
//! Provides the typed update channel used for datafile and client update events,
//! and the one-shot readiness signal marking the first available datafile.

pub mod readiness;
pub mod subscriber;

pub use readiness::Readiness;
pub use subscriber::{Listener, ListenerDisposer, UpdateChannel};
