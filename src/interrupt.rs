//! Cooperative thread interruption.
//!
//! Every thread carries an interrupt flag. Another thread holding an
//! [`Interruptor`] can raise it, which also unparks the target so that a
//! blocked [`sleep`] or [`park_until`] notices right away. Blocking calls
//! consume the flag when they report [`Interrupted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// Returned by a blocking call that was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, thiserror::Error)]
#[error("interrupted")]
pub struct Interrupted;

#[derive(Debug)]
struct Status {
    flag: AtomicBool,
    thread: Thread,
}

thread_local! {
    static CURRENT: Arc<Status> = Arc::new(Status {
        flag: AtomicBool::new(false),
        thread: thread::current(),
    });
}

/// Handle to one thread's interrupt flag.
#[derive(Debug, Clone)]
pub struct Interruptor {
    status: Arc<Status>,
}

impl Interruptor {
    /// Raise the flag and wake the thread if it is parked.
    pub fn interrupt(&self) {
        self.status.flag.store(true, Ordering::Release);
        self.status.thread.unpark();
    }

    pub fn is_interrupted(&self) -> bool {
        self.status.flag.load(Ordering::Acquire)
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.status.thread.name()
    }
}

/// Interruptor for the calling thread.
pub fn current() -> Interruptor {
    CURRENT.with(|status| Interruptor {
        status: status.clone(),
    })
}

/// Whether the calling thread has a pending interrupt. Does not clear it.
pub fn is_interrupted() -> bool {
    CURRENT.with(|status| status.flag.load(Ordering::Acquire))
}

/// Test and clear the calling thread's interrupt flag.
pub fn interrupted() -> bool {
    CURRENT.with(|status| status.flag.swap(false, Ordering::AcqRel))
}

/// Park the calling thread until `done` holds.
///
/// Returns `Ok(true)` once `done()` is true, `Ok(false)` if `deadline`
/// passes first and `Err(Interrupted)` if the thread is interrupted while
/// waiting. Whoever makes `done` true must unpark the waiting thread.
pub fn park_until<F>(deadline: Option<Instant>, mut done: F) -> Result<bool, Interrupted>
where
    F: FnMut() -> bool,
{
    CURRENT.with(|status| loop {
        if done() {
            return Ok(true);
        }
        if status.flag.swap(false, Ordering::AcqRel) {
            return Err(Interrupted);
        }
        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(false);
                }
                thread::park_timeout(deadline - now);
            }
            None => thread::park(),
        }
    })
}

/// Deadline `timeout` from now, `None` when that is too far out to
/// represent. A `None` deadline means waiting without a bound.
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Sleep for `dur` unless interrupted first.
pub fn sleep(dur: Duration) -> Result<(), Interrupted> {
    park_until(deadline_after(dur), || false).map(|_| ())
}
