use super::delay_queue::DelayQueue;
use crate::config::PoolConfig;
use crate::error::{BoxError, Error, Result, TaskError};
use crate::executor::panic_handler::PanicHandler;
use crate::executor::task;
use crate::executor::termination::{ExitGuard, Termination};
use crate::executor::{PoolState, TaskHandle};
use crate::interrupt::{self, Interruptor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// longest delay honored as given; larger ones are clamped to it
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Handle to a task that runs after a delay.
pub struct ScheduledHandle<T> {
    handle: TaskHandle<T>,
    deadline: Instant,
    queue: Weak<DelayQueue>,
}

impl<T> ScheduledHandle<T> {
    /// Time left until the task is due, zero once the deadline passed.
    pub fn delay(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn get(self) -> std::result::Result<T, TaskError> {
        self.handle.get()
    }

    pub fn get_timeout(self, timeout: Duration) -> std::result::Result<T, TaskError> {
        self.handle.get_timeout(timeout)
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// Cancel the task if it has not started. The pool forgets it right
    /// away, so a cancelled task never holds back termination.
    pub fn cancel(&self) -> bool {
        let cancelled = self.handle.cancel();
        if cancelled {
            if let Some(queue) = self.queue.upgrade() {
                queue.purge();
            }
        }
        cancelled
    }
}

impl<T> std::fmt::Debug for ScheduledHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledHandle")
            .field("delay", &self.delay())
            .field("done", &self.is_done())
            .finish()
    }
}

struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    interruptor: Arc<OnceLock<Interruptor>>,
}

/// Workers that run tasks once their delay has elapsed.
///
/// Orderly shutdown still runs every task already scheduled when it becomes
/// due. Dropping the pool shuts it down that way and joins the workers.
pub struct ScheduledPool {
    workers: Vec<WorkerHandle>,
    queue: Arc<DelayQueue>,
    termination: Arc<Termination>,
    panics: Arc<PanicHandler>,
    executed: Arc<AtomicU64>,
    num_threads: usize,
}

impl ScheduledPool {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();

        let queue = Arc::new(DelayQueue::new());
        let termination = Arc::new(Termination::new(num_threads));
        let executed = Arc::new(AtomicU64::new(0));
        let mut workers: Vec<WorkerHandle> = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let queue_clone = queue.clone();
            let termination_clone = termination.clone();
            let executed_clone = executed.clone();
            let interruptor = Arc::new(OnceLock::new());
            let interruptor_clone = interruptor.clone();

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = builder.spawn(move || {
                let _ = interruptor_clone.set(interrupt::current());
                let _exit = ExitGuard(&termination_clone);

                while let Some(task) = queue_clone.take() {
                    task.execute();
                    interrupt::interrupted();
                    executed_clone.fetch_add(1, Ordering::Relaxed);
                }
            });

            match spawned {
                Ok(thread) => workers.push(WorkerHandle {
                    thread: Some(thread),
                    interruptor,
                }),
                Err(e) => {
                    termination.forget(num_threads - workers.len());
                    queue.close(true);
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            }
        }

        tracing::debug!(threads = num_threads, "scheduled pool started");

        Ok(Self {
            workers,
            queue,
            termination,
            panics: Arc::new(PanicHandler::new()),
            executed,
            num_threads,
        })
    }

    /// Scheduled pool with one worker.
    pub fn single_thread() -> Result<Self> {
        let config = PoolConfig::builder()
            .num_threads(1)
            .thread_name_prefix("tasklab-scheduled")
            .build()?;
        Self::new(&config)
    }

    /// Run `f` once `delay` has elapsed.
    pub fn schedule<F, T>(&self, f: F, delay: Duration) -> Result<ScheduledHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.schedule_deferred(move || Ok(f()), delay)
    }

    /// Like [`schedule`](Self::schedule) for an action that may fail.
    pub fn schedule_fallible<F, T, E>(&self, f: F, delay: Duration) -> Result<ScheduledHandle<T>>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.schedule_deferred(move || f().map_err(TaskError::from_action), delay)
    }

    fn schedule_deferred<F, T>(&self, f: F, delay: Duration) -> Result<ScheduledHandle<T>>
    where
        F: FnOnce() -> std::result::Result<T, TaskError> + Send + 'static,
        T: Send + 'static,
    {
        let now = Instant::now();
        let deadline = now
            .checked_add(delay.min(FAR_FUTURE))
            .ok_or_else(|| Error::config(format!("delay {:?} is out of range", delay)))?;

        let (task, handle) = task::deferred(f, self.panics.clone());
        self.queue.push(task, deadline, handle.tracker())?;

        Ok(ScheduledHandle {
            handle,
            deadline,
            queue: Arc::downgrade(&self.queue),
        })
    }

    /// Stop accepting tasks. Scheduled ones still run when due.
    pub fn shutdown(&self) {
        let (first, _) = self.queue.close(false);
        if first {
            tracing::debug!(scheduled = self.queue.len(), "scheduled pool shutting down");
        }
    }

    /// Stop accepting tasks, cancel every task that has not started and
    /// interrupt running ones. Returns how many tasks were cancelled.
    pub fn shutdown_now(&self) -> usize {
        let (_, drained) = self.queue.close(true);
        let removed = drained.len();
        drop(drained);

        for worker in &self.workers {
            if let Some(interruptor) = worker.interruptor.get() {
                interruptor.interrupt();
            }
        }

        tracing::debug!(removed, "scheduled pool stopped");
        removed
    }

    pub fn await_termination(&self, timeout: Duration) -> Result<bool> {
        let deadline = interrupt::deadline_after(timeout);
        Ok(self
            .termination
            .wait(deadline, || self.is_terminated())?)
    }

    pub fn is_shutdown(&self) -> bool {
        self.queue.is_shutdown()
    }

    pub fn is_terminated(&self) -> bool {
        self.is_shutdown() && self.termination.all_exited()
    }

    pub fn state(&self) -> PoolState {
        if self.is_terminated() {
            PoolState::Terminated
        } else if self.is_shutdown() {
            PoolState::ShuttingDown
        } else {
            PoolState::Running
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Tasks waiting for their deadline.
    pub fn scheduled_tasks(&self) -> usize {
        self.queue.len()
    }

    /// When the next scheduled task becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.peek_deadline()
    }

    pub fn tasks_executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

impl Drop for ScheduledPool {
    fn drop(&mut self) {
        self.shutdown();

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::error!("scheduled worker panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for ScheduledPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledPool")
            .field("num_threads", &self.num_threads)
            .field("state", &self.state())
            .field("scheduled_tasks", &self.scheduled_tasks())
            .finish()
    }
}
