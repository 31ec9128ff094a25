//! Injectable sleeping for the scheduler and the reconnection protocol.

use std::time::Duration;

/// Blocks the calling thread for a duration.
pub trait Sleeper: Send {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps on the current OS thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
