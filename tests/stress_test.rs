//! Stress tests for the pools

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasklab::prelude::*;

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_tasks() {
    let pool = ThreadPool::work_stealing().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..100_000)
        .map(|i| {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
                i
            })
            .unwrap()
        })
        .collect();

    let sum: u64 = handles.into_iter().map(|h| h.get().unwrap() as u64).sum();
    assert_eq!(sum, 99_999 * 100_000 / 2);
    assert_eq!(counter.load(Ordering::Relaxed), 100_000);
}

#[test]
#[ignore]
fn stress_test_bulk_invoke_order() {
    let pool = ThreadPool::fixed(8).unwrap();

    for round in 0..50 {
        let tasks: Vec<_> = (0..64u64)
            .map(|i| {
                move || {
                    std::thread::sleep(Duration::from_micros((64 - i) * 10));
                    Ok::<_, Interrupted>(round * 64 + i)
                }
            })
            .collect();

        let values: Vec<u64> = pool
            .invoke_all(tasks)
            .unwrap()
            .into_iter()
            .map(|h| h.get().unwrap())
            .collect();
        let expected: Vec<u64> = (0..64).map(|i| round * 64 + i).collect();
        assert_eq!(values, expected);
    }
}

#[test]
#[ignore]
fn stress_test_many_schedules() {
    let pool = ScheduledPool::new(&PoolConfig::builder().num_threads(4).build().unwrap()).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10_000u64)
        .map(|i| {
            let ran = ran.clone();
            pool.schedule(
                move || {
                    ran.fetch_add(1, Ordering::Relaxed);
                },
                Duration::from_micros(i % 500),
            )
            .unwrap()
        })
        .collect();

    let cancelled = handles.iter().step_by(2).filter(|h| h.cancel()).count();
    for handle in handles {
        let _ = handle.get();
    }

    assert_eq!(ran.load(Ordering::Relaxed) + cancelled, 10_000);
}

#[test]
#[ignore]
fn stress_test_repeated_pool_lifecycle() {
    for i in 0..200 {
        let pool = ThreadPool::fixed(4).unwrap();
        let handle = pool.submit(move || i * 2).unwrap();
        if i % 2 == 0 {
            pool.shutdown();
        } else {
            pool.shutdown_now();
        }
        match handle.get() {
            Ok(v) => assert_eq!(v, i * 2),
            Err(e) => assert!(e.is_cancelled()),
        }
        assert!(pool.await_termination(Duration::from_secs(5)).unwrap());
    }
}
