//! Cooperative cancellation token: a shutdown flag (`Arc<AtomicBool>`)
//! shared with every background task, plus a `Notify` so a waiting
//! suspension point can wake immediately instead of polling on an
//! interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Suspends until either cancellation fires or `fut` resolves,
    /// whichever comes first. Every suspension point a scan passes through
    /// (permit acquisition, query execution, NER call, event publication)
    /// should race its future against this.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        // Register interest before checking the flag so a `cancel()` that
        // lands between the check and the await below is never missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = &mut notified => None,
            result = fut => Some(result),
        }
    }
}
