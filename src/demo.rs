//! The five demonstration routines.
//!
//! Each routine is independent. It receives the pool it works on (where it
//! needs one) and a [`DemoConfig`] with its constants, reports progress
//! through `tracing` and returns what it observed so callers and tests can
//! check it. Fatal conditions come back as `Err`; everything else is logged
//! and swallowed.

use crate::config::DemoConfig;
use crate::error::{Error, Result, TaskError};
use crate::executor::{spawn_detached, Detached, ThreadPool};
use crate::interrupt::{self, Interrupted};
use crate::scheduler::ScheduledPool;
use std::io;
use std::thread;
use std::time::Duration;

fn thread_name() -> String {
    thread::current().name().unwrap_or("unnamed").to_string()
}

/// Starts one background task on its own thread and returns without
/// waiting. The task's failures are only logged.
pub fn run_detached_task(config: &DemoConfig) -> Result<Detached> {
    tracing::info!("run_detached_task - Begin");

    let sleep = config.units(config.detached_sleep);
    let task = spawn_detached("tasklab-detached", move || {
        let name = thread_name();
        tracing::info!("Foo {}", name);
        interrupt::sleep(sleep)?;
        tracing::info!("Bar {}", name);
        Ok::<_, Interrupted>(())
    })?;

    tracing::info!("Done!");
    tracing::info!("run_detached_task - End");
    Ok(task)
}

/// Orderly shutdown with a bounded wait, forcing termination of whatever
/// is left when the wait times out or is interrupted. Safe to call on a
/// pool that is already shut down.
pub fn release(pool: &ThreadPool, timeout: Duration) {
    pool.shutdown();

    match pool.await_termination(timeout) {
        Ok(true) => {}
        Ok(false) => tracing::warn!(?timeout, "pool did not terminate in time"),
        Err(_) => tracing::warn!("Task interrupted"),
    }

    if !pool.is_terminated() {
        tracing::warn!("Cancel non-finished tasks");
    }
    let cancelled = pool.shutdown_now();
    if cancelled > 0 {
        tracing::warn!(cancelled, "dropped queued tasks");
    }
    tracing::info!("Shutdown finished!");
}

/// Submits one no-result task to `pool`, then releases the pool.
pub fn run_pooled_task(pool: &ThreadPool, config: &DemoConfig) -> Result<()> {
    tracing::info!("run_pooled_task - Begin");

    pool.execute(|| {
        tracing::info!("Hello: {}", thread_name());
    })?;
    release(pool, config.units(config.shutdown_timeout));

    tracing::info!("run_pooled_task - End");
    Ok(())
}

/// Submits one computation, blocks for its value and shuts the pool down.
///
/// An interrupted wait is fatal. A failed computation is logged and yields
/// `Ok(None)`.
pub fn run_deferred_result(pool: &ThreadPool, config: &DemoConfig) -> Result<Option<i32>> {
    tracing::info!("run_deferred_result - Begin");

    let sleep = config.units(config.deferred_sleep);
    let value = config.deferred_value;

    let outcome = pool
        .submit_fallible(move || {
            // the computation turns its own interruption into a failure
            interrupt::sleep(sleep)
                .map_err(|_| io::Error::new(io::ErrorKind::Interrupted, "task interrupted"))?;
            Ok::<_, io::Error>(value)
        })
        .map(|handle| handle.get());

    let result = match outcome {
        Ok(Ok(value)) => {
            tracing::info!("Future: {}", value);
            Ok(Some(value))
        }
        Ok(Err(TaskError::WaitInterrupted)) => {
            tracing::error!("interrupted while waiting for the result");
            Err(Error::Interrupted)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "computation failed");
            Ok(None)
        }
        Err(e) => Err(e),
    };

    if !pool.is_shutdown() {
        pool.shutdown();
        tracing::info!("Executor shutdown!");
    }

    if result.is_ok() {
        tracing::info!("run_deferred_result - End");
    }
    result
}

/// Runs four labelled computations at once and collects their results in
/// submission order.
///
/// An interrupted bulk wait yields no results. While collecting, an
/// interrupted or cancelled element becomes `None`; any other failure is
/// fatal.
pub fn run_parallel_batch(
    pool: &ThreadPool,
    config: &DemoConfig,
) -> Result<Vec<Option<String>>> {
    tracing::info!("run_parallel_batch - Begin");

    let tasks: Vec<_> = config
        .batch_sleeps
        .iter()
        .enumerate()
        .map(|(i, &units)| {
            let sleep = config.units(units);
            move || {
                interrupt::sleep(sleep)?;
                tracing::info!("Callable Task{} executed after {} units", i + 1, units);
                Ok::<_, Interrupted>(format!("Task{}", i + 1))
            }
        })
        .collect();

    let handles = match pool.invoke_all(tasks) {
        Ok(handles) => handles,
        Err(Error::Interrupted) => {
            tracing::error!("interrupted while waiting for the batch");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.get() {
            Ok(label) => {
                tracing::info!("{}", label);
                results.push(Some(label));
            }
            Err(
                e @ (TaskError::Interrupted | TaskError::WaitInterrupted | TaskError::Cancelled),
            ) => {
                tracing::warn!(error = %e, "no result for batch element");
                results.push(None);
            }
            Err(e) => {
                tracing::error!(error = %e, "batch element failed");
                return Err(Error::TaskFailed(e));
            }
        }
    }

    tracing::info!("run_parallel_batch - End");
    Ok(results)
}

/// Schedules one computation after a delay and reports, right away, how
/// long it still has to wait.
pub fn run_scheduled_task(pool: &ScheduledPool, config: &DemoConfig) -> Result<Duration> {
    tracing::info!("run_scheduled_task - Begin");

    let handle = pool.schedule(
        || {
            tracing::info!("Callable task in scheduled executor");
            "future"
        },
        config.units(config.schedule_delay),
    )?;

    let remaining = handle.delay();
    tracing::info!("Remaining delay: {}ms", remaining.as_millis());

    tracing::info!("run_scheduled_task - End");
    Ok(remaining)
}
