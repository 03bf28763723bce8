//! Lease auto-renewal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::LockError;
use crate::retry::RetryPolicy;
use crate::traits::AtomicStore;

/// Handle to a running lease-renewal task.
///
/// The task extends the lock's lease on every tick until it is stopped or
/// hits a terminal failure. Terminal failures arrive through
/// [`recv`](Self::recv): at most one over the lock's lifetime, after which
/// the stream is closed. A clean stop, whether from
/// [`Lock::release`](crate::Lock::release) or [`stop`](Self::stop), closes
/// the stream without emitting a value.
#[derive(Debug)]
pub struct Refresher {
    events: mpsc::Receiver<LockError>,
    stop: Arc<watch::Sender<bool>>,
    task: JoinHandle<()>,
}

impl Refresher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn<S: AtomicStore>(
        store: Arc<S>,
        key: String,
        token: String,
        tick: Duration,
        renewed_lease: Duration,
        retry: RetryPolicy,
        stop: Arc<watch::Sender<bool>>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(1);
        let task = tokio::spawn(run(
            store,
            key,
            token,
            tick,
            renewed_lease,
            retry,
            stop_rx,
            events_tx,
        ));

        Self {
            events: events_rx,
            stop,
            task,
        }
    }

    /// Wait for the terminal error, if any.
    ///
    /// Resolves to `Some(error)` when renewal fails for good
    /// ([`LockError::RefreshLost`] on a token mismatch, or the transport
    /// error once the retry budget is exhausted), and to `None` once the
    /// refresher has stopped cleanly.
    pub async fn recv(&mut self) -> Option<LockError> {
        self.events.recv().await
    }

    /// Check for a terminal error without blocking.
    pub fn try_recv(&mut self) -> Option<LockError> {
        self.events.try_recv().ok()
    }

    /// Stop the renewal loop without releasing the lock.
    ///
    /// The loop observes the signal on its next iteration; no further
    /// errors are emitted afterwards. Safe to call any number of times and
    /// concurrently with [`Lock::release`](crate::Lock::release).
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Check whether the renewal task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum Renewal {
    Extended,
    Lost,
    Stopped,
    Failed(LockError),
}

#[allow(clippy::too_many_arguments)]
async fn run<S: AtomicStore>(
    store: Arc<S>,
    key: String,
    token: String,
    tick: Duration,
    renewed_lease: Duration,
    retry: RetryPolicy,
    mut stop: watch::Receiver<bool>,
    events: mpsc::Sender<LockError>,
) {
    let mut ticker = time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; the lease is still
    // fresh from acquisition, so skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            // Check the stop slot first so a release racing a due tick
            // always wins and no error is emitted after a clean stop.
            biased;

            changed = stop.changed() => {
                // Err means the lock handle itself is gone; stop either way.
                let _ = changed;
                debug!(key = %key, "refresher stopped");
                return;
            }
            _ = ticker.tick() => {
                match renew_once(&*store, &key, &token, renewed_lease, &retry, &mut stop).await {
                    Renewal::Extended => {
                        debug!(key = %key, "lease extended");
                    }
                    Renewal::Stopped => {
                        debug!(key = %key, "refresher stopped during retry backoff");
                        return;
                    }
                    Renewal::Lost => {
                        // A release concurrent with this tick deletes the key
                        // before the renewal observes it; that is a stop, not
                        // a loss.
                        if *stop.borrow() {
                            debug!(key = %key, "refresher stopped");
                            return;
                        }
                        warn!(key = %key, "lease lost: stored token no longer matches");
                        let _ = events.send(LockError::RefreshLost).await;
                        return;
                    }
                    Renewal::Failed(e) => {
                        if *stop.borrow() {
                            debug!(key = %key, "refresher stopped");
                            return;
                        }
                        warn!(key = %key, error = %e, "lease renewal failed");
                        let _ = events.send(e).await;
                        return;
                    }
                }
            }
        }
    }
}

/// One renewal round: a compare-and-extend, with the transport class of
/// failures retried per policy. A token mismatch is definitive and returns
/// immediately.
async fn renew_once<S: AtomicStore>(
    store: &S,
    key: &str,
    token: &str,
    renewed_lease: Duration,
    retry: &RetryPolicy,
    stop: &mut watch::Receiver<bool>,
) -> Renewal {
    let mut attempt: u32 = 0;

    loop {
        match store.compare_and_extend(key, token, renewed_lease).await {
            Ok(true) => return Renewal::Extended,
            Ok(false) => return Renewal::Lost,
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                attempt += 1;
                debug!(
                    key = %key,
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient renewal failure, backing off"
                );

                tokio::select! {
                    _ = stop.changed() => return Renewal::Stopped,
                    _ = time::sleep(delay) => {}
                }
            }
            Err(e) => return Renewal::Failed(e),
        }
    }
}
