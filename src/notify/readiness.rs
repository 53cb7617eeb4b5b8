//! One-shot readiness signal shared by managers and managed clients.

use crate::error::{DatafileError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
enum ReadyState<T> {
    Pending,
    Ready(T),
    Failed(DatafileError),
}

impl<T: Clone> ReadyState<T> {
    fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    fn to_result(&self) -> Option<Result<T>> {
        match self {
            Self::Pending => None,
            Self::Ready(value) => Some(Ok(value.clone())),
            Self::Failed(err) => Some(Err(err.clone())),
        }
    }
}

/// A cloneable, awaitable value that settles at most once.
///
/// All clones observe the same outcome. Once resolved or rejected, later attempts
/// to settle it are ignored.
///
/// # Examples
///
/// ```rust
/// use managed_datafile::notify::Readiness;
///
/// # async fn example() {
/// let ready = Readiness::<u32>::pending();
/// let waiter = ready.clone();
///
/// assert!(ready.resolve(7));
/// assert!(!ready.resolve(8));
/// assert_eq!(waiter.wait().await.unwrap(), 7);
/// # }
/// ```
pub struct Readiness<T> {
    state: Arc<watch::Sender<ReadyState<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Readiness<T> {
    fn with_state(state: ReadyState<T>) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Create an unsettled readiness.
    pub fn pending() -> Self {
        Self::with_state(ReadyState::Pending)
    }

    /// Create a readiness that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        Self::with_state(ReadyState::Ready(value))
    }

    /// Create a readiness that is already rejected with `err`.
    pub fn rejected(err: DatafileError) -> Self {
        Self::with_state(ReadyState::Failed(err))
    }

    /// Resolve with `value`. Returns false if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(ReadyState::Ready(value))
    }

    /// Reject with `err`. Returns false if already settled.
    pub fn reject(&self, err: DatafileError) -> bool {
        self.settle(ReadyState::Failed(err))
    }

    fn settle(&self, next: ReadyState<T>) -> bool {
        let mut next = Some(next);
        self.state.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            if let Some(next) = next.take() {
                *state = next;
            }
            true
        })
    }

    /// Whether the readiness has been resolved or rejected.
    pub fn is_settled(&self) -> bool {
        self.state.borrow().is_settled()
    }

    /// The outcome so far, without waiting. `None` while pending.
    pub fn peek(&self) -> Option<Result<T>> {
        self.state.borrow().to_result()
    }

    /// Wait until settled and return the outcome.
    pub async fn wait(&self) -> Result<T> {
        let mut rx = self.state.subscribe();
        // `self` keeps the sender alive, so `wait_for` only returns once settled.
        let outcome = match rx.wait_for(ReadyState::is_settled).await {
            Ok(state) => state.to_result(),
            Err(_) => None,
        };
        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    /// Wait at most `timeout` for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DatafileError::TimeoutError`] if still pending after `timeout`,
    /// or the rejection error if the readiness was rejected.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| DatafileError::TimeoutError(timeout))?
    }
}

impl<T> Clone for Readiness<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for Readiness<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.borrow() {
            ReadyState::Pending => "pending",
            ReadyState::Ready(_) => "ready",
            ReadyState::Failed(_) => "failed",
        };
        f.debug_struct("Readiness").field("state", &state).finish()
    }
}
