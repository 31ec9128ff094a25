//! Cooperative cancellation shared by the per-template tasks of one tick.

use std::sync::atomic::{AtomicBool, Ordering};

/// One-way flag: once cancelled it stays cancelled.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
