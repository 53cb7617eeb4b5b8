//! Typed publish/subscribe channel for datafile and client update notifications.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Callback invoked with each emitted value.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Internal listener registry state.
struct ChannelInner<T> {
    listeners: Vec<(usize, Listener<T>)>,
    next_id: usize,
}

/// Removes one listener registration from an [`UpdateChannel`].
///
/// Disposal is idempotent: calling [`dispose`](Self::dispose) more than once, or
/// dropping the disposer after disposing it, removes the listener exactly once.
/// Dropping an undisposed disposer also removes the listener.
#[must_use = "dropping a ListenerDisposer removes the listener immediately"]
pub struct ListenerDisposer {
    disposed: AtomicBool,
    remove: Box<dyn Fn() + Send + Sync>,
}

impl ListenerDisposer {
    fn new(remove: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            disposed: AtomicBool::new(false),
            remove: Box::new(remove),
        }
    }

    /// Remove the listener. Second and later calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        (self.remove)();
    }

    /// Whether this registration has been removed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for ListenerDisposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ListenerDisposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerDisposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Multi-listener channel for a single event type.
///
/// Listeners are invoked synchronously, in registration order, on the task that
/// calls [`emit`](Self::emit). A listener may dispose itself (or others) while
/// being invoked; the change takes effect from the next emission.
///
/// # Examples
///
/// ```rust
/// use managed_datafile::notify::UpdateChannel;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let channel = UpdateChannel::<u32>::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let seen_clone = Arc::clone(&seen);
/// let disposer = channel.subscribe(move |value: &u32| {
///     seen_clone.fetch_add(*value as usize, Ordering::SeqCst);
/// });
///
/// channel.emit(&5);
/// disposer.dispose();
/// channel.emit(&5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// ```
pub struct UpdateChannel<T> {
    inner: Arc<Mutex<ChannelInner<T>>>,
}

impl<T: 'static> UpdateChannel<T> {
    /// Create a channel with no listeners.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelInner {
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a listener and return its disposer.
    pub fn subscribe<F>(&self, listener: F) -> ListenerDisposer
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(listener))
    }

    /// Register an already shared listener.
    pub fn subscribe_arc(&self, listener: Listener<T>) -> ListenerDisposer {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let registry: Weak<Mutex<ChannelInner<T>>> = Arc::downgrade(&self.inner);
        ListenerDisposer::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().listeners.retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }

    /// Invoke every registered listener with `value`.
    ///
    /// The listener list is snapshotted first, so no lock is held while listeners run.
    pub fn emit(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(value);
        }
    }

    /// Get the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl<T: 'static> Default for UpdateChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for UpdateChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
