//! Task representation and execution.

use super::handle::{self, TaskHandle};
use super::panic_handler::PanicHandler;
use crate::error::TaskError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Internal task representation
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) spawn_time: Instant,
}

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            func: Box::new(f),
            spawn_time: Instant::now(),
        }
    }

    /// Execute the task
    pub fn execute(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}

/// Wrap `f` into a task whose outcome lands in the returned handle.
///
/// The body is skipped when the handle was cancelled before a worker got to
/// it. Panics are caught and reported as [`TaskError::Panicked`].
pub(crate) fn deferred<F, T>(f: F, panics: Arc<PanicHandler>) -> (Task, TaskHandle<T>)
where
    F: FnOnce() -> Result<T, TaskError> + Send + 'static,
    T: Send + 'static,
{
    let (promise, handle) = handle::promise();
    let task = Task::new(move || {
        if !promise.start() {
            return;
        }
        let result = panics
            .execute(f)
            .unwrap_or_else(|info| Err(TaskError::Panicked(info.message)));
        promise.complete(result);
    });
    (task, handle)
}
