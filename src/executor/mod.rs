//! Task execution infrastructure.
//!
//! This module provides the core task execution primitives: worker
//! threads, the work-stealing thread pool, deferred result handles and the
//! detached launcher for one-off background threads.

pub mod detached;
pub mod handle;
pub mod panic_handler;
pub mod task;
pub(crate) mod termination;
pub mod thread_pool;
pub mod worker;

pub use detached::{spawn_detached, Detached};
pub use handle::TaskHandle;
pub use panic_handler::{PanicHandler, PanicInfo};
pub use task::TaskId;
pub use thread_pool::{PoolState, PoolStats, ThreadPool};

pub(crate) use task::Task;
