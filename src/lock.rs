//! Acquired lock handle.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{LockError, Result};
use crate::refresh::Refresher;
use crate::retry::RetryPolicy;
use crate::traits::AtomicStore;

/// Lifecycle state of a lock handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Ownership granted and not yet released.
    Active,
    /// Released, or definitively lost at release time.
    Released,
}

/// One granted, time-bounded ownership of a named resource.
///
/// The token is generated at acquisition and immutable for the lock's
/// lifetime; every extend or delete at the store is guarded by it. Dropping
/// an active lock signals any refresher to stop and spawns a best-effort
/// release.
#[derive(Debug)]
pub struct Lock<S: AtomicStore> {
    key: String,
    token: String,
    lease: Duration,
    store: Arc<S>,
    retry: RetryPolicy,
    state: LockState,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    stop_sent: bool,
    refresher_started: bool,
}

impl<S: AtomicStore> Lock<S> {
    pub(crate) fn new(
        key: String,
        token: String,
        lease: Duration,
        store: Arc<S>,
        retry: RetryPolicy,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            key,
            token,
            lease,
            store,
            retry,
            state: LockState::Active,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            stop_sent: false,
            refresher_started: false,
        }
    }

    /// The locked resource key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The ownership token stored under the key.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Check whether the handle has been released.
    pub fn is_active(&self) -> bool {
        self.state == LockState::Active
    }

    /// Release the lock.
    ///
    /// Executes one atomic compare-and-delete round trip: the key is removed
    /// only if it still stores this lock's token. A mismatch returns
    /// [`LockError::NotHeld`], meaning the lease expired or was reassigned;
    /// that is never reported as success.
    ///
    /// Any running refresher is signalled to stop exactly once per lock,
    /// before the store round trip and regardless of the delete outcome, so
    /// no background task outlives this call. Calling `release` again after
    /// it has settled returns `Ok(())`. A transport failure leaves the lock
    /// active so the caller may retry the delete.
    pub async fn release(&mut self) -> Result<()> {
        if self.state == LockState::Released {
            return Ok(());
        }

        self.signal_stop();

        match self.store.compare_and_delete(&self.key, &self.token).await {
            Ok(true) => {
                self.state = LockState::Released;
                debug!(key = %self.key, "released lock");
                Ok(())
            }
            Ok(false) => {
                self.state = LockState::Released;
                warn!(key = %self.key, "failed to release lock (not held or expired)");
                Err(LockError::NotHeld)
            }
            Err(e) => Err(e),
        }
    }

    /// Start a background task that periodically extends the lease.
    ///
    /// `tick` must be strictly shorter than both the original lease and
    /// `renewed_lease`, so the lease cannot lapse between successful
    /// renewals. At most one refresher may run per lock.
    ///
    /// The returned [`Refresher`] yields at most one terminal error over the
    /// lock's lifetime; a clean stop (from [`release`](Self::release) or
    /// [`Refresher::stop`]) closes the stream without a value.
    pub fn auto_refresh(&mut self, tick: Duration, renewed_lease: Duration) -> Result<Refresher> {
        if self.state == LockState::Released {
            return Err(LockError::NotHeld);
        }
        if self.refresher_started {
            return Err(LockError::RefresherRunning);
        }
        if tick.is_zero() {
            return Err(LockError::InvalidInterval(
                "tick interval must be non-zero".to_string(),
            ));
        }
        if tick >= self.lease || tick >= renewed_lease {
            return Err(LockError::InvalidInterval(format!(
                "tick {:?} must be shorter than the original lease {:?} and the renewed lease {:?}",
                tick, self.lease, renewed_lease
            )));
        }

        self.refresher_started = true;

        Ok(Refresher::spawn(
            Arc::clone(&self.store),
            self.key.clone(),
            self.token.clone(),
            tick,
            renewed_lease,
            self.retry.clone(),
            Arc::clone(&self.stop_tx),
            self.stop_rx.clone(),
        ))
    }

    fn signal_stop(&mut self) {
        if !self.stop_sent {
            self.stop_sent = true;
            let _ = self.stop_tx.send(true);
        }
    }
}

impl<S: AtomicStore> Drop for Lock<S> {
    fn drop(&mut self) {
        if self.state == LockState::Released {
            return;
        }

        self.signal_stop();

        // Best effort release on drop
        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let token = self.token.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = store.compare_and_delete(&key, &token).await;
            });
        }
    }
}
