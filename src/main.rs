//! Runs the five task execution demos one after another.

use anyhow::Context;
use std::io;
use tasklab::demo;
use tasklab::{DemoConfig, ScheduledPool, ThreadPool};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stdout))
        .with(env_filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = DemoConfig::default();

    let detached = demo::run_detached_task(&config).context("detached task")?;

    {
        let pool = ThreadPool::single_thread().context("single-thread pool")?;
        demo::run_pooled_task(&pool, &config).context("pooled task")?;
    }

    {
        let pool = ThreadPool::fixed(1).context("fixed pool")?;
        demo::run_deferred_result(&pool, &config).context("deferred result")?;
    }

    {
        let pool = ThreadPool::work_stealing().context("work-stealing pool")?;
        demo::run_parallel_batch(&pool, &config).context("parallel batch")?;
    }

    {
        let pool = ScheduledPool::single_thread().context("scheduled pool")?;
        demo::run_scheduled_task(&pool, &config).context("scheduled task")?;
    }

    // the routine never waits on it; joined here so its output is not cut off
    detached.join().context("detached task")?;

    Ok(())
}
