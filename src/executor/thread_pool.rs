use super::handle::TaskHandle;
use super::panic_handler::PanicHandler;
use super::task::{self, Task};
use super::termination::{ExitGuard, Termination};
use super::worker::{Worker, WorkerId, WorkerState};
use crate::config::PoolConfig;
use crate::error::{BoxError, Error, Result, TaskError};
use crate::interrupt::{self, Interruptor};
use crossbeam_deque::{Injector, Steal, Stealer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

/// Lifecycle of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    ShuttingDown,
    Terminated,
}

/// Counters aggregated over all workers of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub tasks_executed: u64,
    pub tasks_stolen: u64,
    pub tasks_panicked: u64,
}

/// State shared between the pool handle and its workers.
pub(crate) struct Shared {
    pub(crate) injector: Injector<Task>,
    // serializes submission against shutdown
    lifecycle: Mutex<()>,
    shutdown: AtomicBool,
    stop: AtomicBool,
    pending_tasks: AtomicUsize,
    termination: Termination,
}

impl Shared {
    fn new(num_threads: usize) -> Self {
        Self {
            injector: Injector::new(),
            lifecycle: Mutex::new(()),
            shutdown: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            pending_tasks: AtomicUsize::new(0),
            termination: Termination::new(num_threads),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn pending_tasks(&self) -> usize {
        self.pending_tasks.load(Ordering::Acquire)
    }

    pub(crate) fn task_finished(&self) {
        self.pending_tasks.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn tasks_discarded(&self, n: usize) {
        if n > 0 {
            self.pending_tasks.fetch_sub(n, Ordering::AcqRel);
        }
    }

    fn is_terminated(&self) -> bool {
        self.is_shutdown() && self.termination.all_exited()
    }

    fn push(&self, task: Task) -> Result<()> {
        let _guard = self.lifecycle.lock();
        if self.is_shutdown() {
            return Err(Error::Rejected);
        }
        self.pending_tasks.fetch_add(1, Ordering::AcqRel);
        self.injector.push(task);
        Ok(())
    }

    /// Flip to shutting down. False if that already happened.
    fn begin_shutdown(&self, stop: bool) -> bool {
        let _guard = self.lifecycle.lock();
        if stop {
            self.stop.store(true, Ordering::Release);
        }
        !self.shutdown.swap(true, Ordering::AcqRel)
    }
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
    unparker: Thread,
    interruptor: Arc<OnceLock<Interruptor>>,
    state: Arc<WorkerState>,
}

/// A fixed set of worker threads executing submitted tasks.
///
/// Workers pull from a shared injector queue and steal from each other when
/// idle. Dropping the pool shuts it down in order and joins every worker.
pub struct ThreadPool {
    workers: Vec<WorkerHandle>,
    shared: Arc<Shared>,
    panics: Arc<PanicHandler>,
    num_threads: usize,
    next_wake: AtomicUsize,
}

impl ThreadPool {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let shared = Arc::new(Shared::new(num_threads));
        let panics = Arc::new(PanicHandler::new());

        let workers: Vec<Worker> = (0..num_threads).map(Worker::new).collect();
        let stealers: Arc<[Stealer<Task>]> = workers
            .iter()
            .map(|worker| worker.local_queue.stealer())
            .collect();

        let mut handles: Vec<WorkerHandle> = Vec::with_capacity(num_threads);

        for worker in workers {
            let id = worker.id;
            let state = worker.state.clone();
            let shared_clone = shared.clone();
            let stealers_clone = stealers.clone();
            let interruptor = Arc::new(OnceLock::new());
            let interruptor_clone = interruptor.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = builder.spawn(move || {
                let _ = interruptor_clone.set(interrupt::current());
                let _exit = ExitGuard(&shared_clone.termination);
                worker.run(&shared_clone, &stealers_clone);
            });

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    // workers that never started cannot report their exit
                    shared.termination.forget(num_threads - handles.len());
                    shared.begin_shutdown(true);
                    for handle in &handles {
                        handle.unparker.unpark();
                    }
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            };

            let unparker = thread.thread().clone();

            handles.push(WorkerHandle {
                id,
                thread: Some(thread),
                unparker,
                interruptor,
                state,
            });
        }

        tracing::debug!(
            threads = num_threads,
            prefix = %config.thread_name_prefix,
            "thread pool started"
        );

        Ok(Self {
            workers: handles,
            shared,
            panics,
            num_threads,
            next_wake: AtomicUsize::new(0),
        })
    }

    /// Pool with exactly one worker.
    pub fn single_thread() -> Result<Self> {
        let config = PoolConfig::builder()
            .num_threads(1)
            .thread_name_prefix("tasklab-single")
            .build()?;
        Self::new(&config)
    }

    /// Pool with `n` workers.
    pub fn fixed(n: usize) -> Result<Self> {
        let config = PoolConfig::builder()
            .num_threads(n)
            .thread_name_prefix("tasklab-fixed")
            .build()?;
        Self::new(&config)
    }

    /// Pool sized to the available hardware parallelism.
    pub fn work_stealing() -> Result<Self> {
        let config = PoolConfig::builder()
            .num_threads(num_cpus::get())
            .thread_name_prefix("tasklab-steal")
            .build()?;
        Self::new(&config)
    }

    fn push(&self, task: Task) -> Result<()> {
        self.shared.push(task)?;

        // Wake up a worker
        let next = self.next_wake.fetch_add(1, Ordering::Relaxed) % self.num_threads;
        if let Some(worker) = self.workers.get(next) {
            worker.unparker.unpark();
        }
        Ok(())
    }

    /// Fire a task whose result nobody observes.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let panics = self.panics.clone();
        self.push(Task::new(move || {
            let _ = panics.execute(f);
        }))
    }

    /// Submit a task and get a handle to its result. A panic inside `f`
    /// surfaces as [`TaskError::Panicked`].
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_deferred(move || Ok(f()))
    }

    /// Submit a task that may fail. `Err(Interrupted)` surfaces as
    /// [`TaskError::Interrupted`], any other error as [`TaskError::Failed`].
    pub fn submit_fallible<F, T, E>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.submit_deferred(move || f().map_err(TaskError::from_action))
    }

    fn submit_deferred<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> std::result::Result<T, TaskError> + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = task::deferred(f, self.panics.clone());
        self.push(task)?;
        Ok(handle)
    }

    /// Submit every task and block until all of them have finished.
    ///
    /// Handles come back in submission order. If the wait is interrupted,
    /// every unfinished task is cancelled, running ones by interrupting
    /// them, and [`Error::Interrupted`] is returned.
    pub fn invoke_all<I, F, T, E>(&self, tasks: I) -> Result<Vec<TaskHandle<T>>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        let mut handles = Vec::new();
        for f in tasks {
            match self.submit_fallible(f) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    abort_all(&handles);
                    return Err(e);
                }
            }
        }

        for handle in &handles {
            if handle.wait().is_err() {
                abort_all(&handles);
                return Err(Error::Interrupted);
            }
        }

        Ok(handles)
    }

    /// Stop accepting tasks. Already queued tasks still run. Calling this
    /// more than once is a no-op.
    pub fn shutdown(&self) {
        if self.shared.begin_shutdown(false) {
            tracing::debug!(pending = self.pending_tasks(), "thread pool shutting down");
        }
        self.wake_all();
    }

    /// Stop accepting tasks, drop every queued task and interrupt running
    /// ones. Returns how many tasks were removed from the shared queue.
    pub fn shutdown_now(&self) -> usize {
        self.shared.begin_shutdown(true);

        let mut removed = 0;
        loop {
            match self.shared.injector.steal() {
                Steal::Success(task) => {
                    drop(task);
                    removed += 1;
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
        self.shared.tasks_discarded(removed);

        for worker in &self.workers {
            if let Some(interruptor) = worker.interruptor.get() {
                interruptor.interrupt();
            }
        }
        self.wake_all();

        tracing::debug!(removed, "thread pool stopped");
        removed
    }

    /// Wait for every worker to exit after a shutdown.
    ///
    /// `Ok(true)` once terminated, `Ok(false)` if `timeout` elapsed first.
    /// `Duration::MAX` waits without a bound.
    pub fn await_termination(&self, timeout: Duration) -> Result<bool> {
        let deadline = interrupt::deadline_after(timeout);
        Ok(self
            .shared
            .termination
            .wait(deadline, || self.shared.is_terminated())?)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.is_terminated()
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

    /// Tasks queued or running.
    pub fn pending_tasks(&self) -> usize {
        self.shared.pending_tasks()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            tasks_panicked: self.panics.panic_count() as u64,
            ..PoolStats::default()
        };
        for worker in &self.workers {
            stats.tasks_executed += worker.state.tasks_executed.load(Ordering::Relaxed);
            stats.tasks_stolen += worker.state.tasks_stolen.load(Ordering::Relaxed);
        }
        stats
    }

    fn wake_all(&self) {
        for worker in &self.workers {
            worker.unparker.unpark();
        }
    }
}

fn abort_all<T>(handles: &[TaskHandle<T>]) {
    for handle in handles {
        handle.abort();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::error!(worker = worker.id, "worker thread panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads)
            .field("state", &self.state())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::Interrupted;

    #[test]
    fn test_submit_returns_value() {
        let pool = ThreadPool::fixed(2).unwrap();
        let handle = pool.submit(|| 6 * 7).unwrap();
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn test_execute_runs_task() {
        let pool = ThreadPool::single_thread().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let seen = seen.clone();
            pool.execute(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)).unwrap());
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        assert_eq!(pool.stats().tasks_executed, 10);
    }

    #[test]
    fn test_worker_names_use_prefix() {
        let config = PoolConfig::builder()
            .num_threads(1)
            .thread_name_prefix("named")
            .build()
            .unwrap();
        let pool = ThreadPool::new(&config).unwrap();
        let name = pool
            .submit(|| thread::current().name().map(str::to_string))
            .unwrap()
            .get()
            .unwrap();
        assert_eq!(name.as_deref(), Some("named-0"));
    }

    #[test]
    fn test_panic_is_reported_through_handle() {
        let pool = ThreadPool::single_thread().unwrap();
        let handle = pool.submit(|| -> u32 { panic!("bad task") }).unwrap();
        match handle.get() {
            Err(TaskError::Panicked(msg)) => assert_eq!(msg, "bad task"),
            other => panic!("unexpected {:?}", other),
        }

        // the worker survives
        assert_eq!(pool.submit(|| 1).unwrap().get().unwrap(), 1);
        assert_eq!(pool.stats().tasks_panicked, 1);
    }

    #[test]
    fn test_fallible_errors() {
        let pool = ThreadPool::single_thread().unwrap();

        let failed = pool
            .submit_fallible(|| -> std::result::Result<u8, std::io::Error> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk"))
            })
            .unwrap();
        assert!(matches!(failed.get(), Err(TaskError::Failed(_))));

        let interrupted = pool
            .submit_fallible(|| -> std::result::Result<u8, Interrupted> { Err(Interrupted) })
            .unwrap();
        assert!(interrupted.get().unwrap_err().is_interrupted());
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let pool = ThreadPool::single_thread().unwrap();
        pool.shutdown();
        assert!(matches!(pool.submit(|| ()), Err(Error::Rejected)));
        assert!(matches!(pool.execute(|| ()), Err(Error::Rejected)));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = ThreadPool::fixed(2).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.shutdown_now(), 0);
        assert!(pool.await_termination(Duration::from_secs(5)).unwrap());
        pool.shutdown();
        assert_eq!(pool.state(), PoolState::Terminated);
    }

    #[test]
    fn test_orderly_shutdown_drains_queue() {
        let pool = ThreadPool::single_thread().unwrap();
        let handles: Vec<_> = (0..5)
            .map(|i| {
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(5));
                    i
                })
                .unwrap()
            })
            .collect();

        pool.shutdown();
        assert_eq!(pool.state(), PoolState::ShuttingDown);
        assert!(pool.await_termination(Duration::from_secs(5)).unwrap());

        let values: Vec<i32> = handles.into_iter().map(|h| h.get().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shutdown_now_interrupts_and_cancels() {
        let pool = ThreadPool::single_thread().unwrap();
        let started = Arc::new(AtomicBool::new(false));
        let started_flag = started.clone();

        let running = pool
            .submit_fallible(move || {
                started_flag.store(true, Ordering::SeqCst);
                interrupt::sleep(Duration::from_secs(30))?;
                Ok::<_, Interrupted>("finished")
            })
            .unwrap();
        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        let queued = pool.submit(|| "never").unwrap();
        let removed = pool.shutdown_now();

        assert!(running.get().unwrap_err().is_interrupted());
        assert!(queued.get().unwrap_err().is_cancelled());
        assert!(removed <= 1);
        assert!(pool.await_termination(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn test_await_termination_times_out() {
        let pool = ThreadPool::single_thread().unwrap();
        pool.execute(|| thread::sleep(Duration::from_millis(200))).unwrap();
        pool.shutdown();
        assert!(!pool.await_termination(Duration::from_millis(10)).unwrap());
        assert!(pool.await_termination(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn test_await_termination_interrupted() {
        let pool = ThreadPool::single_thread().unwrap();
        interrupt::current().interrupt();
        assert!(matches!(
            pool.await_termination(Duration::from_secs(5)),
            Err(Error::Interrupted)
        ));
    }

    #[test]
    fn test_invoke_all_keeps_submission_order() {
        let pool = ThreadPool::fixed(4).unwrap();
        let finished = Arc::new(Mutex::new(Vec::new()));

        let tasks: Vec<_> = [40u64, 10, 30, 20]
            .into_iter()
            .enumerate()
            .map(|(i, ms)| {
                let finished = finished.clone();
                move || {
                    interrupt::sleep(Duration::from_millis(ms))?;
                    finished.lock().push(i);
                    Ok::<_, Interrupted>(i)
                }
            })
            .collect();

        let handles = pool.invoke_all(tasks).unwrap();
        assert!(handles.iter().all(TaskHandle::is_done));

        let values: Vec<usize> = handles.into_iter().map(|h| h.get().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
        assert_eq!(finished.lock().len(), 4);
    }

    #[test]
    fn test_interrupted_invoke_all_stops_running_tasks() {
        let pool = ThreadPool::fixed(1).unwrap();
        let me = interrupt::current();
        let interrupter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            me.interrupt();
        });

        let tasks = vec![|| {
            interrupt::sleep(Duration::from_secs(3))?;
            Ok::<_, Interrupted>(())
        }];
        assert!(matches!(pool.invoke_all(tasks), Err(Error::Interrupted)));
        interrupter.join().unwrap();

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_millis(500)).unwrap());
        assert_eq!(pool.pending_tasks(), 0);
    }

    #[test]
    fn test_await_termination_unbounded() {
        let pool = ThreadPool::fixed(2).unwrap();
        pool.execute(|| thread::sleep(Duration::from_millis(10))).unwrap();
        pool.shutdown();
        assert!(pool.await_termination(Duration::MAX).unwrap());
    }

    #[test]
    fn test_invoke_all_rejected_after_shutdown() {
        let pool = ThreadPool::fixed(2).unwrap();
        pool.shutdown();
        let tasks = vec![|| Ok::<_, Interrupted>(1)];
        assert!(matches!(pool.invoke_all(tasks), Err(Error::Rejected)));
    }

    #[test]
    fn test_drop_joins_workers() {
        let done = Arc::new(AtomicBool::new(false));
        {
            let pool = ThreadPool::single_thread().unwrap();
            let done = done.clone();
            pool.execute(move || {
                thread::sleep(Duration::from_millis(20));
                done.store(true, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert!(done.load(Ordering::SeqCst));
    }
}
