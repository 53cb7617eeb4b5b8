//! Datafile manager over a document known up front.

use crate::core::{Datafile, DatafileListener, DatafileManager};
use crate::notify::{ListenerDisposer, Readiness, UpdateChannel};
use std::sync::Arc;

/// Serves a fixed datafile with no network activity.
///
/// Readiness is resolved at construction, `start`/`stop` do nothing, and update
/// listeners are accepted but never invoked.
///
/// # Examples
///
/// ```rust
/// use managed_datafile::prelude::*;
///
/// let datafile = Datafile::from_json(r#"{"revision": "1"}"#).unwrap();
/// let manager = StaticDatafileManager::new(datafile);
///
/// assert_eq!(manager.get().unwrap().revision(), Some("1"));
/// assert!(manager.on_ready().is_settled());
/// ```
pub struct StaticDatafileManager {
    datafile: Arc<Datafile>,
    ready: Readiness<Arc<Datafile>>,
    updates: UpdateChannel<Arc<Datafile>>,
}

impl StaticDatafileManager {
    /// Create a manager serving `datafile`.
    pub fn new(datafile: impl Into<Arc<Datafile>>) -> Self {
        let datafile = datafile.into();
        Self {
            ready: Readiness::resolved(Arc::clone(&datafile)),
            datafile,
            updates: UpdateChannel::new(),
        }
    }
}

impl DatafileManager for StaticDatafileManager {
    fn get(&self) -> Option<Arc<Datafile>> {
        Some(Arc::clone(&self.datafile))
    }

    fn on_ready(&self) -> Readiness<Arc<Datafile>> {
        self.ready.clone()
    }

    fn on_update(&self, listener: DatafileListener) -> ListenerDisposer {
        // Never emitted; kept so disposers behave like those of a live manager.
        self.updates.subscribe_arc(Arc::from(listener))
    }

    fn start(&self) {}

    fn stop(&self) {}
}
