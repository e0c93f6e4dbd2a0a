use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{Result, WranglerError};

/// Monotonic cancellation flag shared by the orchestrator and every state
/// machine it drives. Once raised it stays raised.
#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    raised: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.raised.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the signal is raised.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(WranglerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the signal is raised (immediately if it already is).
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a concurrent `cancel`
            // cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Cancellable sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.guard(tokio::time::sleep(duration)).await
    }

    /// Race `fut` against the signal; cancellation wins ties.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(WranglerError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

/// `now + timeout`, or `None` (no deadline) when that is past what
/// [`tokio::time::Instant`] can represent.
pub fn deadline_after(timeout: Duration) -> Option<tokio::time::Instant> {
    tokio::time::Instant::now().checked_add(timeout)
}

/// Whether a deadline from [`deadline_after`] has passed.
pub fn is_past(deadline: Option<tokio::time::Instant>) -> bool {
    deadline.is_some_and(|d| tokio::time::Instant::now() >= d)
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_monotonic() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.check().is_ok());
        signal.cancel();
        signal.cancel();
        assert!(signal.is_cancelled());
        assert!(signal.check().unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_cancel() {
        let signal = CancellationSignal::new();
        let remote = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            remote.cancel();
        });
        let start = tokio::time::Instant::now();
        let res = signal.sleep(Duration::from_secs(3600)).await;
        assert!(res.unwrap_err().is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn guard_passes_output_through() {
        let signal = CancellationSignal::new();
        let out = signal.guard(async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_saturates_instead_of_overflowing() {
        assert!(deadline_after(Duration::from_secs(u64::MAX)).is_none());
        assert!(!is_past(None));

        let deadline = deadline_after(Duration::from_secs(2));
        assert!(deadline.is_some());
        assert!(!is_past(deadline));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(is_past(deadline));
    }

    #[tokio::test]
    async fn guard_refuses_to_start_after_cancel() {
        let signal = CancellationSignal::new();
        signal.cancel();
        let res = signal.guard(async { 7 }).await;
        assert!(res.is_err());
    }
}
