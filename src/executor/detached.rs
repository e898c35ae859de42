//! Fire-and-forget tasks on their own thread, outside any pool.

use super::panic_handler::PanicHandler;
use crate::error::{BoxError, Error, Result};
use crate::interrupt::{self, Interruptor};
use crossbeam_channel::bounded;
use std::thread::{self, JoinHandle};

/// A task running on a thread nobody manages.
///
/// Dropping this detaches the thread for good. Failures of the task are
/// logged on its own thread and never reach the caller.
#[derive(Debug)]
pub struct Detached {
    thread: JoinHandle<()>,
    interruptor: Interruptor,
}

impl Detached {
    pub fn interrupt(&self) {
        self.interruptor.interrupt();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread.thread().name()
    }

    /// Wait for the thread to exit.
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| Error::executor("detached thread panicked"))
    }
}

/// Start `f` on a new thread named `name` and return without waiting.
pub fn spawn_detached<F, E>(name: impl Into<String>, f: F) -> Result<Detached>
where
    F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
    E: Into<BoxError>,
{
    let (tx, rx) = bounded(1);

    let thread = thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let _ = tx.send(interrupt::current());

            // panics are logged by the handler
            if let Ok(Err(e)) = PanicHandler::new().execute(f) {
                let e: BoxError = e.into();
                tracing::error!(
                    thread = thread::current().name().unwrap_or("unnamed"),
                    error = %e,
                    "detached task failed"
                );
            }
        })
        .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

    let interruptor = rx
        .recv()
        .map_err(|_| Error::executor("detached thread exited before starting"))?;

    Ok(Detached {
        thread,
        interruptor,
    })
}
