//! Stop requests for running harvesters
//!
//! A [`ShutdownCoordinator`] is a one-way latch. The Ctrl+C handler flips it
//! and every scheduler holding a clone wakes from its inter-cycle sleep. A
//! cycle already in progress never observes the latch; the scheduler checks
//! it only between cycles, so the in-flight cycle still commits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Coordinator shared by a signal handler and any number of schedulers
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// One-way stop latch with async wake-up
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    requested: AtomicBool,
    wake: Notify,
}

impl ShutdownCoordinator {
    /// Unlatched coordinator
    pub fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Coordinator ready to hand to several schedulers
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Latch the stop request and wake sleeping schedulers
    ///
    /// Later calls are no-ops.
    pub fn request_shutdown(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.wake.notify_waiters();
        }
    }

    /// Check the latch without waiting
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once a stop has been requested, including one made earlier
    pub async fn wait_for_shutdown(&self) {
        let notified = self.wake.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a request in between is not missed
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }
}
