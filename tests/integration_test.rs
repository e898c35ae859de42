use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tasklab::demo;
use tasklab::interrupt;
use tasklab::prelude::*;

fn fast() -> DemoConfig {
    DemoConfig::with_time_unit(Duration::from_millis(10))
}

/// Units long enough that nothing finishes on its own during a test.
fn glacial() -> DemoConfig {
    DemoConfig::with_time_unit(Duration::from_secs(10))
}

/// Interrupt the calling thread after `after`.
fn interrupt_me_after(after: Duration) -> thread::JoinHandle<()> {
    let me = interrupt::current();
    thread::spawn(move || {
        thread::sleep(after);
        me.interrupt();
    })
}

#[test]
fn test_pooled_task_shuts_pool_down() {
    let pool = ThreadPool::single_thread().unwrap();
    demo::run_pooled_task(&pool, &fast()).unwrap();

    assert!(pool.is_shutdown());
    assert_eq!(pool.state(), PoolState::Terminated);
    assert!(matches!(pool.submit(|| ()), Err(Error::Rejected)));
}

#[test]
fn test_deferred_result_observes_value_after_sleep() {
    let config = fast();
    let pool = ThreadPool::fixed(1).unwrap();

    let start = Instant::now();
    let value = demo::run_deferred_result(&pool, &config).unwrap();

    assert_eq!(value, Some(123));
    assert!(start.elapsed() >= config.units(config.deferred_sleep));
}

#[test]
fn test_parallel_batch_ignores_completion_order() {
    let pool = ThreadPool::fixed(4).unwrap();
    let results = demo::run_parallel_batch(&pool, &fast()).unwrap();

    let labels: Vec<&str> = results.iter().map(|r| r.as_deref().unwrap()).collect();
    assert_eq!(labels, ["Task1", "Task2", "Task3", "Task4"]);
}

#[test]
fn test_parallel_batch_on_work_stealing_pool() {
    let pool = ThreadPool::work_stealing().unwrap();
    let results = demo::run_parallel_batch(&pool, &fast()).unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(Option::is_some));
}

#[test]
fn test_scheduled_delay_within_bounds() {
    let config = fast();
    let pool = ScheduledPool::single_thread().unwrap();

    let remaining = demo::run_scheduled_task(&pool, &config).unwrap();

    assert!(remaining > Duration::ZERO);
    assert!(remaining <= config.units(config.schedule_delay));
}

#[test]
fn test_shutdown_twice_does_not_fail() {
    let pool = ThreadPool::single_thread().unwrap();
    demo::run_pooled_task(&pool, &fast()).unwrap();

    pool.shutdown();
    demo::release(&pool, Duration::from_millis(10));
    assert!(matches!(
        demo::run_deferred_result(&pool, &fast()),
        Err(Error::Rejected)
    ));

    let scheduled = ScheduledPool::single_thread().unwrap();
    scheduled.shutdown();
    scheduled.shutdown();
    assert!(scheduled.await_termination(Duration::from_secs(5)).unwrap());
}

#[test]
fn test_interrupted_detached_task_does_not_crash() {
    let task = demo::run_detached_task(&glacial()).unwrap();
    assert!(!task.is_finished());

    task.interrupt();
    assert!(task.join().is_ok());
}

#[test]
fn test_interrupted_batch_tasks_yield_absent_results() {
    let pool = Arc::new(ThreadPool::fixed(4).unwrap());

    let stopper = {
        let pool = pool.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            pool.shutdown_now();
        })
    };

    let results = demo::run_parallel_batch(&pool, &glacial()).unwrap();
    stopper.join().unwrap();

    assert_eq!(results, vec![None, None, None, None]);
}

#[test]
fn test_interrupted_batch_wait_yields_nothing() {
    let pool = ThreadPool::fixed(4).unwrap();
    let interrupter = interrupt_me_after(Duration::from_millis(50));

    let results = demo::run_parallel_batch(&pool, &glacial()).unwrap();
    interrupter.join().unwrap();

    assert!(results.is_empty());
    pool.shutdown_now();
}

#[test]
fn test_interrupted_deferred_wait_is_fatal() {
    let pool = ThreadPool::single_thread().unwrap();
    let interrupter = interrupt_me_after(Duration::from_millis(50));

    let result = demo::run_deferred_result(&pool, &glacial());
    interrupter.join().unwrap();

    assert!(matches!(result, Err(Error::Interrupted)));
    assert!(pool.is_shutdown());
    pool.shutdown_now();
}

#[test]
fn test_failed_deferred_computation_is_swallowed() {
    let pool = Arc::new(ThreadPool::single_thread().unwrap());

    let stopper = {
        let pool = pool.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            pool.shutdown_now();
        })
    };

    // the computation is interrupted and reports that as its own failure
    let result = demo::run_deferred_result(&pool, &glacial());
    stopper.join().unwrap();

    assert!(matches!(result, Ok(None)));
}

#[test]
fn test_custom_pool_config() {
    let config = PoolConfig::builder()
        .num_threads(2)
        .thread_name_prefix("custom")
        .build()
        .unwrap();
    let pool = ThreadPool::new(&config).unwrap();
    assert_eq!(pool.num_threads(), 2);

    let name = pool
        .submit(|| thread::current().name().unwrap_or_default().to_string())
        .unwrap()
        .get()
        .unwrap();
    assert!(name.starts_with("custom-"));
}
