//! Test helper utilities and common functionality.

use crate::config::RuntimeConfig;
use crate::runtime::Runtime;
use crate::sched::RunQueue;
use crate::thread::{ThreadFlags, ThreadId, ThreadState};
use alloc::vec::Vec;

pub(crate) fn runtime(max_threads: usize) -> Runtime {
    let config = RuntimeConfig::builder()
        .max_threads(max_threads)
        .name("test")
        .build()
        .unwrap();
    Runtime::new(config)
}

pub(crate) fn spawn_n(rt: &Runtime, count: usize) -> Vec<ThreadId> {
    (0..count).map(|_| rt.spawn().unwrap()).collect()
}

/// Check every registered thread under its own lock.
///
/// Holding a thread's lock freezes its run queue membership, so the flag
/// and the queue must agree exactly.
pub(crate) fn assert_invariants(rt: &Runtime) {
    let registry = rt.registry().lock();
    for tcb in registry.threads() {
        let guard = tcb.lock();
        let queued = rt.run_queue().contains(guard.id());
        let flagged = guard.flags().contains(ThreadFlags::IN_RUN_QUEUE);

        assert!(guard.is_consistent(), "inconsistent thread: {:?}", guard);
        assert_eq!(queued, flagged, "queue membership out of step: {:?}", guard);
        assert_eq!(
            guard.state() == ThreadState::Runnable,
            queued,
            "runnable thread off the queue: {:?}",
            guard
        );
    }
}

/// Simple linear congruential generator for randomized operation sequences.
pub(crate) struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 33
    }

    pub(crate) fn gen_range(&mut self, min: usize, max: usize) -> usize {
        min + (self.next_u64() as usize % (max - min))
    }

    pub(crate) fn gen_bool(&mut self) -> bool {
        self.next_u64() & 1 == 0
    }
}
