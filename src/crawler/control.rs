//! Pause, resume and shutdown control shared by the scheduler and walkers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Cloneable handle to the crawl's pause flag
///
/// Pausing never interrupts a fetch in flight. Walkers observe the flag at
/// page boundaries and between retries; the scheduler observes it before
/// starting each source and between ticks.
#[derive(Debug, Clone, Default)]
pub struct PauseController {
    inner: Arc<ControlState>,
}

#[derive(Debug, Default)]
struct ControlState {
    paused: AtomicBool,
    stopping: AtomicBool,
    wake: Notify,
}

impl PauseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pause flag
    pub fn pause(&self) {
        if !self.inner.paused.swap(true, Ordering::SeqCst) {
            info!("Crawling paused");
        }
    }

    /// Clears the pause flag and wakes the scheduler for an immediate tick
    pub fn resume(&self) {
        if self.inner.paused.swap(false, Ordering::SeqCst) {
            info!("Crawling resumed");
        }
        self.inner.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Pauses and asks the scheduler loop to exit once the current page ends
    pub fn shutdown(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
        self.pause();
        self.inner.wake.notify_one();
    }

    pub fn is_stopping(&self) -> bool {
        self.inner.stopping.load(Ordering::SeqCst)
    }

    /// Completes on the next [`resume`](Self::resume) or [`shutdown`](Self::shutdown)
    ///
    /// A wake-up issued before this is awaited is not lost.
    pub async fn woken(&self) {
        self.inner.wake.notified().await;
    }
}
