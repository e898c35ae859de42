use crate::error::{Error, Result};
use crate::executor::handle::Resolved;
use crate::executor::{Task, TaskId};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

pub(crate) struct DelayedTask {
    pub task: Task,
    pub deadline: Instant,
    tracker: Arc<dyn Resolved>,
}

impl DelayedTask {
    fn id(&self) -> TaskId {
        self.task.id
    }
}

impl PartialEq for DelayedTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id() == other.id()
    }
}

impl Eq for DelayedTask {}

impl PartialOrd for DelayedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap: earliest deadline, then lowest id, ranks highest
impl Ord for DelayedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id().cmp(&self.id()))
    }
}

struct QueueState {
    heap: BinaryHeap<DelayedTask>,
    shutdown: bool,
    stop: bool,
}

/// Tasks ordered by the instant they become due.
pub(crate) struct DelayQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                shutdown: false,
                stop: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, task: Task, deadline: Instant, tracker: Arc<dyn Resolved>) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(Error::Rejected);
        }

        state.heap.push(DelayedTask {
            task,
            deadline,
            tracker,
        });
        // the new task may be due before whatever a worker is waiting on
        self.available.notify_all();
        Ok(())
    }

    /// Block until a task is due. `None` tells the worker to exit.
    pub fn take(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if state.stop {
                return None;
            }

            match state.heap.peek().map(|delayed| delayed.deadline) {
                Some(deadline) if deadline <= Instant::now() => {
                    return state.heap.pop().map(|delayed| delayed.task);
                }
                Some(deadline) => {
                    self.available.wait_until(&mut state, deadline);
                }
                None if state.shutdown => return None,
                None => self.available.wait(&mut state),
            }
        }
    }

    /// Close the queue. With `stop`, also hand back every queued task.
    /// The flag is true only for the call that closed the queue.
    pub fn close(&self, stop: bool) -> (bool, Vec<DelayedTask>) {
        let mut state = self.state.lock();
        let first = !state.shutdown;
        state.shutdown = true;

        let drained = if stop {
            state.stop = true;
            std::mem::take(&mut state.heap).into_vec()
        } else {
            Vec::new()
        };

        self.available.notify_all();
        (first, drained)
    }

    /// Remove tasks whose handle already resolved, e.g. cancelled ones.
    pub fn purge(&self) -> usize {
        let mut state = self.state.lock();
        let before = state.heap.len();
        state.heap.retain(|delayed| !delayed.tracker.is_resolved());
        let removed = before - state.heap.len();
        if removed > 0 {
            self.available.notify_all();
        }
        removed
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Deadline of the next task to become due.
    pub fn peek_deadline(&self) -> Option<Instant> {
        self.state.lock().heap.peek().map(|delayed| delayed.deadline)
    }
}

impl Default for DelayQueue {
    fn default() -> Self {
        Self::new()
    }
}
