//! Runtime handle tying the registry and run queue together.
//!
//! This module provides the main `Runtime` struct. The suspend engine and
//! the dispatcher hooks are implemented on it in [`crate::sched`].

use crate::config::RuntimeConfig;
use crate::errors::{LookupError, SpawnError};
use crate::mem::{PinnedHandle, Registry};
use crate::sched::{FifoRunQueue, RunQueue};
use crate::thread::{ThreadFlags, ThreadId, ThreadSnapshot, ThreadState};

extern crate alloc;
use alloc::{string::String, vec::Vec};

/// Per-state thread counts, taken in one pass under the registry lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    pub total: usize,
    pub runnable: usize,
    pub running: usize,
    pub blocked: usize,
    pub suspended: usize,
    /// `Exiting`, `Dead` and `Deadlocked` threads not yet reclaimed.
    pub terminal: usize,
}

/// Main runtime handle.
///
/// # Type Parameters
///
/// * `Q` - Run queue implementation consulted by the dispatcher
pub struct Runtime<Q: RunQueue = FifoRunQueue> {
    registry: Registry,
    run_queue: Q,
    name: &'static str,
}

impl Runtime<FifoRunQueue> {
    /// Create a runtime with a FIFO run queue sized for `config.max_threads()`.
    pub fn new(config: RuntimeConfig) -> Self {
        let run_queue = FifoRunQueue::with_capacity(config.max_threads());
        Self::with_run_queue(config, run_queue)
    }
}

impl<Q: RunQueue> Runtime<Q> {
    /// Create a runtime that dispatches from `run_queue`.
    ///
    /// The queue should start empty; every id it holds must belong to this
    /// runtime's registry.
    pub fn with_run_queue(config: RuntimeConfig, run_queue: Q) -> Self {
        log::debug!(
            "[{}] runtime created with {} thread slots",
            config.name(),
            config.max_threads()
        );
        Self {
            registry: Registry::new(&config),
            run_queue,
            name: config.name(),
        }
    }

    /// The thread registry backing this runtime.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The run queue the dispatcher consults.
    pub fn run_queue(&self) -> &Q {
        &self.run_queue
    }

    /// Label from the configuration, used to prefix log records.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register an unnamed thread as `Runnable` at the back of the run queue.
    ///
    /// # Errors
    ///
    /// [`SpawnError::TooManyThreads`] when every registry slot is taken.
    pub fn spawn(&self) -> Result<ThreadId, SpawnError> {
        self.spawn_named(None)
    }

    pub(crate) fn spawn_named(&self, name: Option<String>) -> Result<ThreadId, SpawnError> {
        let run_queue = &self.run_queue;
        self.registry.insert(name, |guard| {
            guard.insert_flags(ThreadFlags::IN_RUN_QUEUE);
            run_queue.push_back(guard.id());
        })
    }

    /// Pin a thread by id. See [`Registry::pin`].
    pub fn pin(&self, id: ThreadId, include_dead: bool) -> Result<PinnedHandle<'_>, LookupError> {
        self.registry.pin(id, include_dead)
    }

    /// Consistent view of one thread, including finished ones that are
    /// still pinned.
    pub fn snapshot(&self, id: ThreadId) -> Result<ThreadSnapshot, LookupError> {
        let pin = self.registry.pin(id, true)?;
        let snapshot = pin.tcb().snapshot();
        drop(pin);
        Ok(snapshot)
    }

    /// Snapshot every registered thread.
    pub fn threads(&self) -> Vec<ThreadSnapshot> {
        let registry = self.registry.lock();
        registry.threads().map(|tcb| tcb.snapshot()).collect()
    }

    pub fn thread_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> SchedStats {
        let registry = self.registry.lock();
        let mut stats = SchedStats::default();
        for tcb in registry.threads() {
            stats.total += 1;
            match tcb.state() {
                ThreadState::Runnable => stats.runnable += 1,
                ThreadState::Running => stats.running += 1,
                ThreadState::Blocked => stats.blocked += 1,
                ThreadState::Suspended => stats.suspended += 1,
                ThreadState::Exiting | ThreadState::Dead | ThreadState::Deadlocked => {
                    stats.terminal += 1
                }
            }
        }
        stats
    }
}

impl<Q: RunQueue> core::fmt::Debug for Runtime<Q> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runtime")
            .field("name", &self.name)
            .field("threads", &self.thread_count())
            .field("queued", &self.run_queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spawn_enqueues_runnable() {
        let rt = Runtime::new(RuntimeConfig::builder().max_threads(2).build().unwrap());
        let a = rt.spawn().unwrap();
        let b = rt.spawn().unwrap();
        assert_eq!(rt.spawn(), Err(SpawnError::TooManyThreads));

        assert_eq!(rt.run_queue().front(), Some(a));
        assert_eq!(rt.run_queue().len(), 2);
        let snap = rt.snapshot(b).unwrap();
        assert_eq!(snap.state, ThreadState::Runnable);
        assert!(snap.in_run_queue());
        assert_eq!(snap.ref_count, 1, "the snapshot's own pin");
    }

    #[test]
    fn test_stats_by_state() {
        let rt = Runtime::new(RuntimeConfig::builder().max_threads(4).build().unwrap());
        for _ in 0..4 {
            rt.spawn().unwrap();
        }
        let r0 = rt.dispatch().unwrap();
        let r1 = rt.dispatch().unwrap();
        let r2 = rt.dispatch().unwrap();
        rt.block(r1);
        rt.suspend_all(&r0);

        assert_eq!(
            rt.stats(),
            SchedStats {
                total: 4,
                runnable: 0,
                running: 2,
                blocked: 1,
                suspended: 1,
                terminal: 0,
            }
        );
        assert_eq!(rt.threads().len(), 4);
        drop(r2);
    }

    #[test]
    fn test_custom_run_queue() {
        let config = RuntimeConfig::builder().name("custom").build().unwrap();
        let rt = Runtime::with_run_queue(config, FifoRunQueue::new());
        assert_eq!(rt.name(), "custom");
        let id = rt.spawn().unwrap();
        assert_eq!(rt.dispatch().map(|r| r.id()), Some(id));
    }
}
