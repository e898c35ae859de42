//! Exponential backoff for idle worker loops.

use std::hint::spin_loop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Spin, then yield, before an idle worker parks.
#[derive(Debug)]
pub struct Backoff {
    step: AtomicUsize,
}

impl Backoff {
    const SPIN_LIMIT: usize = 6;
    const YIELD_LIMIT: usize = 10;

    pub fn new() -> Self {
        Self {
            step: AtomicUsize::new(0),
        }
    }

    /// Reset the backoff to its initial state
    pub fn reset(&self) {
        self.step.store(0, Ordering::Relaxed);
    }

    /// Perform one step of backoff
    pub fn spin(&self) {
        let step = self.step.fetch_add(1, Ordering::Relaxed);

        if step <= Self::SPIN_LIMIT {
            for _ in 0..(1 << step) {
                spin_loop();
            }
        } else {
            thread::yield_now();
        }
    }

    /// True once spinning and yielding are exhausted and the caller should
    /// block instead.
    pub fn is_completed(&self) -> bool {
        self.step.load(Ordering::Relaxed) > Self::YIELD_LIMIT
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
