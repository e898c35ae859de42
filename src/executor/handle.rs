//! Deferred results.
//!
//! A submitted task is split into a `Promise` that travels with the task
//! and a [`TaskHandle`] kept by the submitter. Both sides share one
//! `Completion` slot. Waiters park and are unparked when the slot is
//! filled. A promise dropped without completing (the task was discarded)
//! resolves the slot to [`TaskError::Cancelled`]. While the task runs the
//! slot remembers the running thread so the task can be interrupted.

use crate::error::TaskError;
use crate::interrupt::{self, Interruptor};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

enum Slot<T> {
    Pending,
    Running,
    Done(Result<T, TaskError>),
    Taken,
}

struct Inner<T> {
    slot: Slot<T>,
    runner: Option<Interruptor>,
    waiters: Vec<Thread>,
}

pub(crate) struct Completion<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Completion<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slot: Slot::Pending,
                runner: None,
                waiters: Vec::new(),
            }),
        }
    }

    /// Marks the task as started on the calling thread. False if it was
    /// cancelled first.
    fn start(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.slot {
            Slot::Pending => {
                inner.slot = Slot::Running;
                inner.runner = Some(interrupt::current());
                true
            }
            _ => false,
        }
    }

    /// Interrupts the running task. The slot is still `Running` while the
    /// lock is held, so the interrupt lands before the task completes.
    fn interrupt_runner(&self) -> bool {
        let inner = self.inner.lock();
        match (&inner.slot, &inner.runner) {
            (Slot::Running, Some(runner)) => {
                runner.interrupt();
                true
            }
            _ => false,
        }
    }

    /// Fills the slot unless it is already resolved.
    fn resolve(&self, result: Result<T, TaskError>, only_pending: bool) -> bool {
        let waiters = {
            let mut inner = self.inner.lock();
            let open = match inner.slot {
                Slot::Pending => true,
                Slot::Running => !only_pending,
                Slot::Done(_) | Slot::Taken => false,
            };
            if !open {
                return false;
            }
            inner.slot = Slot::Done(result);
            inner.runner = None;
            std::mem::take(&mut inner.waiters)
        };

        for waiter in waiters {
            waiter.unpark();
        }
        true
    }

    fn is_done(&self) -> bool {
        matches!(self.inner.lock().slot, Slot::Done(_) | Slot::Taken)
    }

    fn take(&self) -> Option<Result<T, TaskError>> {
        let mut inner = self.inner.lock();
        match std::mem::replace(&mut inner.slot, Slot::Taken) {
            Slot::Done(result) => Some(result),
            other => {
                inner.slot = other;
                None
            }
        }
    }

    /// Blocks until resolved or `deadline`. Ok(false) on timeout.
    fn wait(&self, deadline: Option<Instant>) -> Result<bool, TaskError> {
        {
            let mut inner = self.inner.lock();
            if matches!(inner.slot, Slot::Done(_) | Slot::Taken) {
                return Ok(true);
            }
            inner.waiters.push(thread::current());
        }

        let outcome = interrupt::park_until(deadline, || self.is_done());
        if !matches!(outcome, Ok(true)) {
            let me = thread::current().id();
            self.inner.lock().waiters.retain(|waiter| waiter.id() != me);
        }
        outcome.map_err(|_| TaskError::WaitInterrupted)
    }
}

/// Type-erased view of a completion, used by queues that need to skip
/// tasks whose handle was already resolved.
pub(crate) trait Resolved: Send + Sync {
    fn is_resolved(&self) -> bool;
}

impl<T: Send> Resolved for Completion<T> {
    fn is_resolved(&self) -> bool {
        self.is_done()
    }
}

/// Producer side of a deferred result, owned by the task body.
pub(crate) struct Promise<T> {
    completion: Arc<Completion<T>>,
}

impl<T> Promise<T> {
    pub(crate) fn start(&self) -> bool {
        self.completion.start()
    }

    pub(crate) fn complete(self, result: Result<T, TaskError>) {
        self.completion.resolve(result, false);
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // no-op when already completed
        self.completion.resolve(Err(TaskError::Cancelled), false);
    }
}

pub(crate) fn promise<T>() -> (Promise<T>, TaskHandle<T>) {
    let completion = Arc::new(Completion::new());
    (
        Promise {
            completion: completion.clone(),
        },
        TaskHandle { completion },
    )
}

/// Handle to the eventual result of a submitted task.
pub struct TaskHandle<T> {
    completion: Arc<Completion<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes and return its outcome.
    ///
    /// Fails with [`TaskError::WaitInterrupted`] if the calling thread is
    /// interrupted while waiting.
    pub fn get(self) -> Result<T, TaskError> {
        self.completion.wait(None)?;
        self.completion.take().unwrap_or(Err(TaskError::Cancelled))
    }

    /// Like [`get`](Self::get), giving up with [`TaskError::TimedOut`]
    /// after `timeout`.
    pub fn get_timeout(self, timeout: Duration) -> Result<T, TaskError> {
        if !self.completion.wait(interrupt::deadline_after(timeout))? {
            return Err(TaskError::TimedOut);
        }
        self.completion.take().unwrap_or(Err(TaskError::Cancelled))
    }

    /// Block until the task finishes without taking its result.
    pub fn wait(&self) -> Result<(), TaskError> {
        self.completion.wait(None).map(|_| ())
    }

    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }

    /// Cancel the task if it has not started yet.
    pub fn cancel(&self) -> bool {
        self.completion.resolve(Err(TaskError::Cancelled), true)
    }

    /// Cancel the task if it has not started, otherwise interrupt it while
    /// it runs. False once the task has finished.
    pub fn abort(&self) -> bool {
        self.cancel() || self.completion.interrupt_runner()
    }
}

impl<T: Send + 'static> TaskHandle<T> {
    pub(crate) fn tracker(&self) -> Arc<dyn Resolved> {
        self.completion.clone()
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("done", &self.is_done())
            .finish()
    }
}
