//! Loop cadence.
//!
//! A fixed-rate cadence measures each iteration and sleeps only for what is
//! left of the period; an iteration that overruns is followed immediately by
//! the next one. Stop requests are observed between iterations only.

use crate::util::{Sleeper, ThreadSleeper};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Iteration pacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// Iterate as fast as capture and matching complete.
    Uncapped,
    /// Target `ticks_per_second` iterations per second.
    FixedRate { ticks_per_second: u32 },
}

impl Cadence {
    /// Returns the target period, if any.
    pub fn period(&self) -> Option<Duration> {
        match *self {
            Cadence::Uncapped => None,
            Cadence::FixedRate { ticks_per_second } if ticks_per_second > 0 => {
                Some(Duration::from_secs(1) / ticks_per_second)
            }
            Cadence::FixedRate { .. } => None,
        }
    }
}

/// Positive remainder of `period` after `elapsed`.
pub fn remaining(period: Duration, elapsed: Duration) -> Option<Duration> {
    period.checked_sub(elapsed).filter(|rest| !rest.is_zero())
}

/// Runs a tick closure at a cadence until a running flag clears.
pub struct PollScheduler {
    cadence: Cadence,
    sleeper: Box<dyn Sleeper>,
}

impl PollScheduler {
    pub fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Replaces the sleeper used for the compensating delay.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Calls `tick` while `running` is set and returns the number of ticks.
    pub fn run<F: FnMut()>(&mut self, running: &AtomicBool, mut tick: F) -> u64 {
        let period = self.cadence.period();
        let mut ticks = 0u64;
        while running.load(Ordering::Acquire) {
            let started = Instant::now();
            tick();
            ticks += 1;
            if let Some(rest) = period.and_then(|p| remaining(p, started.elapsed())) {
                if running.load(Ordering::Acquire) {
                    self.sleeper.sleep(rest);
                }
            }
        }
        ticks
    }
}
