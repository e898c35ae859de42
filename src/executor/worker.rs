// worker thread loop
use super::task::Task;
use super::thread_pool::Shared;
use crate::interrupt;
use crate::util::Backoff;
use crossbeam_deque::{Steal, Stealer, Worker as WorkerQueue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type WorkerId = usize;

const IDLE_PARK: Duration = Duration::from_millis(1);

// stats for each worker
#[derive(Debug, Default)]
pub struct WorkerState {
    pub tasks_executed: AtomicU64,
    pub tasks_stolen: AtomicU64,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub local_queue: WorkerQueue<Task>,
    pub state: Arc<WorkerState>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            local_queue: WorkerQueue::new_fifo(),
            state: Arc::new(WorkerState::default()),
        }
    }

    // main loop
    pub fn run(&self, shared: &Shared, stealers: &[Stealer<Task>]) {
        let backoff = Backoff::new();

        loop {
            if shared.is_stopped() {
                let discarded = self.discard_local();
                shared.tasks_discarded(discarded);
                break;
            }

            // local -> global -> steal
            if let Some(task) = self.find_task(shared, stealers) {
                backoff.reset();
                self.execute_task(task);
                shared.task_finished();
                continue;
            }

            // orderly shutdown exits once nothing is queued or running
            if shared.is_shutdown() && shared.pending_tasks() == 0 {
                break;
            }

            if backoff.is_completed() {
                thread::park_timeout(IDLE_PARK);
            } else {
                backoff.spin();
            }
        }

        tracing::trace!(worker = self.id, "worker exiting");
    }

    fn find_task(&self, shared: &Shared, stealers: &[Stealer<Task>]) -> Option<Task> {
        // 1. Check local queue first (best cache locality)
        if let Some(task) = self.local_queue.pop() {
            return Some(task);
        }

        // 2. Check global injector queue
        loop {
            match shared.injector.steal_batch_and_pop(&self.local_queue) {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        // 3. Steal from other workers
        self.try_steal_from_workers(stealers)
    }

    fn try_steal_from_workers(&self, stealers: &[Stealer<Task>]) -> Option<Task> {
        use rand::seq::SliceRandom;
        use rand::thread_rng;

        if stealers.len() < 2 {
            return None;
        }

        let mut indices: Vec<usize> = (0..stealers.len()).collect();
        indices.shuffle(&mut thread_rng());

        for &idx in &indices {
            if idx == self.id {
                continue;
            }

            loop {
                match stealers[idx].steal_batch_and_pop(&self.local_queue) {
                    Steal::Success(task) => {
                        self.state.tasks_stolen.fetch_add(1, Ordering::Relaxed);
                        return Some(task);
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    fn execute_task(&self, task: Task) {
        let tid = task.id;

        // task bodies capture their own panics; this only guards the worker
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            task.execute();
        }));

        if result.is_err() {
            tracing::error!(worker = self.id, task = ?tid, "task panicked outside its handle");
        }

        // an interrupt aimed at the finished task must not leak into the next one
        interrupt::interrupted();

        self.state.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop whatever this worker batched locally; their handles resolve as
    /// cancelled.
    fn discard_local(&self) -> usize {
        let mut discarded = 0;
        while let Some(task) = self.local_queue.pop() {
            tracing::debug!(worker = self.id, task = ?task.id, "discarding queued task");
            drop(task);
            discarded += 1;
        }
        discarded
    }
}
