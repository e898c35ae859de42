//! Delayed task execution.
//!
//! A [`ScheduledPool`] keeps tasks in a deadline-ordered queue and hands each
//! one to a worker once it is due. [`ScheduledHandle::delay`] reports how
//! long a task still has to wait.

mod delay_queue;
pub mod scheduled_pool;

pub use scheduled_pool::{ScheduledHandle, ScheduledPool};
