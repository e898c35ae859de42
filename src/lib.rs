//! tasklab - task execution primitives on OS threads
//!
//! Worker pools with deferred results, bulk invocation that keeps
//! submission order, one-shot delayed execution with delay introspection
//! and fire-and-forget background threads. Blocking calls are
//! interruptible through a cooperative per-thread interrupt flag.
//!
//! # Quick Start
//!
//! ```no_run
//! use tasklab::prelude::*;
//! use std::time::Duration;
//!
//! let pool = ThreadPool::fixed(4).unwrap();
//! let handle = pool.submit(|| 6 * 7).unwrap();
//! assert_eq!(handle.get().unwrap(), 42);
//!
//! let scheduler = ScheduledPool::single_thread().unwrap();
//! let later = scheduler.schedule(|| "done", Duration::from_millis(100)).unwrap();
//! println!("due in {:?}", later.delay());
//! ```
//!
//! # Modules
//!
//! - [`executor`]: thread pool, task handles, detached threads
//! - [`scheduler`]: delayed execution
//! - [`interrupt`]: cooperative interruption of sleeping and waiting threads
//! - [`demo`]: the five demonstration routines run by the binary

#![warn(missing_debug_implementations)]

pub mod config;
pub mod demo;
pub mod error;
pub mod executor;
pub mod interrupt;
pub mod prelude;
pub mod scheduler;
pub mod util;

pub use config::{DemoConfig, PoolConfig, PoolConfigBuilder};
pub use error::{Error, Result, TaskError};
pub use executor::{spawn_detached, Detached, TaskHandle, ThreadPool};
pub use scheduler::{ScheduledHandle, ScheduledPool};
