use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ClientError, ProviderError};

/// Delay schedule between reachability probes: doubles from `initial` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failed probe.
    pub initial: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    /// A schedule starting at `initial`, capped at `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// The delay that follows `current`.
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

/// Create a linked cancellation pair.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx: Arc::new(tx) },
        CancelSignal { rx: Some(rx) },
    )
}

/// Fires cancellation for every [`CancelSignal`] subscribed to it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancel all current and future waits on this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new signal tied to this handle.
    pub fn subscribe(&self) -> CancelSignal {
        CancelSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// The receiving side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested.
    ///
    /// Pends forever if the handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Call `probe` until it succeeds, `timeout` elapses, or `cancel` fires.
///
/// Sleeps between failed probes follow `backoff`, each clipped to the time
/// left before the deadline. On timeout the last probe error is returned
/// inside [`ProviderError::Timeout`]. A probe still in flight when `cancel`
/// fires is dropped.
pub async fn wait_until_reachable<P, Fut>(
    operation: &str,
    mut probe: P,
    timeout: Duration,
    backoff: &Backoff,
    cancel: &mut CancelSignal,
) -> Result<(), ProviderError>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ClientError>>,
{
    let deadline = Instant::now() + timeout;
    let mut delay = backoff.initial;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled(operation.to_string()));
        }

        attempt += 1;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ProviderError::Cancelled(operation.to_string()));
            }
            outcome = probe() => outcome,
        };
        let err = match outcome {
            Ok(()) => {
                debug!(operation, attempt, "reachable");
                return Ok(());
            }
            Err(err) => err,
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(ProviderError::Timeout {
                operation: operation.to_string(),
                waited: timeout,
                source: err,
            });
        }

        let pause = delay.min(deadline - now);
        debug!(operation, attempt, error = %err, backoff = ?pause, "not reachable yet, retrying");

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ProviderError::Cancelled(operation.to_string()));
            }
            _ = tokio::time::sleep(pause) => {}
        }

        delay = backoff.next(delay);
    }
}
