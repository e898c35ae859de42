use crate::interrupt::{self, Interrupted};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Thread};
use std::time::Instant;

/// Counts live workers and wakes threads waiting for the last one to exit.
#[derive(Debug)]
pub(crate) struct Termination {
    live_workers: AtomicUsize,
    waiters: Mutex<Vec<Thread>>,
}

impl Termination {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            live_workers: AtomicUsize::new(workers),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn all_exited(&self) -> bool {
        self.live_workers.load(Ordering::Acquire) == 0
    }

    pub(crate) fn worker_exited(&self) {
        self.forget(1);
    }

    /// Account for `n` workers that are gone, or never started.
    pub(crate) fn forget(&self, n: usize) {
        if n == 0 {
            return;
        }
        if self.live_workers.fetch_sub(n, Ordering::AcqRel) == n {
            for waiter in self.waiters.lock().drain(..) {
                waiter.unpark();
            }
        }
    }

    /// Park until `terminated()` holds or `deadline` passes. A `None`
    /// deadline waits without a bound.
    pub(crate) fn wait<F>(
        &self,
        deadline: Option<Instant>,
        terminated: F,
    ) -> Result<bool, Interrupted>
    where
        F: Fn() -> bool,
    {
        {
            let mut waiters = self.waiters.lock();
            if terminated() {
                return Ok(true);
            }
            waiters.push(thread::current());
        }
        let outcome = interrupt::park_until(deadline, terminated);
        if !matches!(outcome, Ok(true)) {
            let me = thread::current().id();
            self.waiters.lock().retain(|waiter| waiter.id() != me);
        }
        outcome
    }
}

// marks the worker gone even if its loop unwinds
pub(crate) struct ExitGuard<'a>(pub(crate) &'a Termination);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}
