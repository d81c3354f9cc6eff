//! Stress tests for concurrency and high-load scenarios.
//!
//! Host threads stand in for virtual CPUs; each one drives the runtime
//! through the same public hooks an embedding dispatcher would.

use super::helpers::{assert_invariants, runtime, spawn_n, SimpleRng};
use crate::errors::{LookupError, SuspendError};
use crate::sched::RunQueue;
use crate::thread::{ThreadId, ThreadState};
use alloc::vec::Vec;
use portable_atomic::{AtomicBool, Ordering};
use pretty_assertions::assert_eq;

#[test]
fn test_exit_racing_suspend_is_safe() {
    for _ in 0..500 {
        let rt = runtime(4);
        let ids = spawn_n(&rt, 2);
        let caller = rt.dispatch().unwrap();
        let target = rt.dispatch().unwrap();
        let rt = &rt;

        let result = std::thread::scope(|s| {
            s.spawn(move || rt.exit(target));
            let suspender = s.spawn(|| rt.suspend_one(&caller, ids[1]));
            suspender.join().unwrap()
        });

        assert!(
            matches!(result, Ok(()) | Err(SuspendError::NotFound)),
            "unexpected {:?}",
            result
        );
        assert_eq!(rt.thread_count(), 1);
        assert_eq!(rt.snapshot(ids[1]).unwrap_err(), LookupError::NotFound);
        assert_invariants(rt);
    }
}

#[test]
fn test_concurrent_suspend_and_dispatch() {
    const WORKERS: usize = 12;
    let rt = runtime(WORKERS + 1);
    let ids = spawn_n(&rt, WORKERS + 1);
    let controller = rt.dispatch().unwrap();
    assert_eq!(controller.id(), ids[0]);
    let workers = &ids[1..];
    let done = AtomicBool::new(false);
    let rt = &rt;

    std::thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    if let Some(running) = rt.dispatch() {
                        let state = rt.yield_now(running);
                        assert!(matches!(state, ThreadState::Runnable | ThreadState::Suspended));
                    }
                }
            });
        }

        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                assert_invariants(rt);
                std::thread::yield_now();
            }
        });

        let mut rng = SimpleRng::new(0xabcdef);
        for round in 0..2_000 {
            let target = workers[rng.gen_range(0, workers.len())];
            if rng.gen_bool() {
                assert_eq!(rt.suspend_one(&controller, target), Ok(()));
            } else {
                assert_eq!(rt.resume_one(&controller, target), Ok(()));
            }
            if round % 250 == 0 {
                rt.suspend_all(&controller);
                rt.resume_all(&controller);
            }
        }
        done.store(true, Ordering::Release);
    });

    rt.resume_all(&controller);
    assert_invariants(rt);
    assert_eq!(rt.run_queue().len(), WORKERS);
    for &id in workers {
        let snap = rt.snapshot(id).unwrap();
        assert_eq!(snap.state, ThreadState::Runnable);
        assert!(!snap.suspend_requested());
    }
}

#[test]
fn test_lookup_during_thread_churn() {
    let rt = runtime(8);
    let issued: &spin::Mutex<Vec<ThreadId>> = &spin::Mutex::new(Vec::new());
    let done = &AtomicBool::new(false);
    let rt = &rt;

    std::thread::scope(|s| {
        for seed in [1, 2] {
            s.spawn(move || {
                let mut rng = SimpleRng::new(seed);
                while !done.load(Ordering::Acquire) {
                    let id = {
                        let issued = issued.lock();
                        if issued.is_empty() {
                            continue;
                        }
                        issued[rng.gen_range(0, issued.len())]
                    };
                    match rt.snapshot(id) {
                        Ok(snap) => assert_eq!(snap.id, id),
                        Err(LookupError::NotFound) => {}
                    }
                    let _ = rt.interrupt(id);
                }
            });
        }

        let churners: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(move || {
                    for _ in 0..2_000 {
                        if let Ok(id) = rt.spawn() {
                            issued.lock().push(id);
                        }
                        if let Some(running) = rt.dispatch() {
                            rt.exit(running);
                        }
                    }
                })
            })
            .collect();
        for churner in churners {
            churner.join().unwrap();
        }
        done.store(true, Ordering::Release);
    });

    while let Some(running) = rt.dispatch() {
        rt.exit(running);
    }
    assert_eq!(rt.thread_count(), 0);
    assert!(!issued.lock().is_empty());
}
