//! Cooperative shutdown signal.
//!
//! A [`Shutdown`] is shared (usually behind an [`Arc`](std::sync::Arc))
//! between the event pipeline and whoever decides it should stop: a
//! Ctrl-C handler, a test, or an embedding service. The pipeline checks
//! the flag at the top of every poll cycle and also races its blocking
//! read against [`Shutdown::wait`], so a request is seen promptly.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A one-way stop flag with async wake-up.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    /// Create a handle with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every waiter.
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Whether a stop has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Wait until a stop is requested.
    ///
    /// Returns immediately if one already has been.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}
