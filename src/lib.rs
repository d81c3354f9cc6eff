#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Suspend/resume engine for an M:N user-space thread runtime.
//!
//! One thread can pause another live thread, or every other thread, without
//! that thread's cooperation, and later let it run again. The engine
//! coordinates three racing concerns: whether the target is still alive,
//! whether it sits on the run queue, and concurrent mutation of scheduler
//! state by other threads.
//!
//! # Features
//!
//! - `std`: enable `std` support in `thiserror` and `log` for hosted builds
//!
//! # Quick Start
//!
//! ```
//! use mn_threads::{Runtime, RuntimeConfig, ThreadState};
//!
//! let rt = Runtime::new(RuntimeConfig::default());
//! let main = rt.spawn().unwrap();
//! let worker = rt.spawn().unwrap();
//!
//! let me = rt.dispatch().unwrap();
//! assert_eq!(me.id(), main);
//!
//! rt.suspend_one(&me, worker).unwrap();
//! assert_eq!(rt.snapshot(worker).unwrap().state, ThreadState::Suspended);
//!
//! rt.resume_one(&me, worker).unwrap();
//! assert_eq!(rt.snapshot(worker).unwrap().state, ThreadState::Runnable);
//! ```
//!
//! # Architecture
//!
//! - [`Registry`]: fixed arena of thread control blocks with
//!   generation-checked ids
//! - [`PinnedHandle`]: reference-counted pin that keeps a control block
//!   from being reclaimed
//! - [`SchedGuard`]: per-thread scheduling lock; the only writer of state
//!   and flags
//! - [`RunQueue`]: ready-to-run collection, kept in step with `IN_RUN_QUEUE`
//! - [`CriticalSection`]: non-preemptible region for the calling thread

pub mod config;
pub mod errors;
pub mod mem;
pub mod runtime;
pub mod sched;
pub mod thread;

#[cfg(test)]
extern crate std;

extern crate alloc;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Runtime
pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use runtime::{Runtime, SchedStats};

// Scheduler
pub use sched::{CriticalSection, Delivery, FifoRunQueue, ResumeOutcome, RunQueue, SuspendOutcome};

// Threads
pub use thread::{
    lock_pair, Running, SchedGuard, Tcb, ThreadBuilder, ThreadFlags, ThreadId, ThreadSnapshot,
    ThreadState,
};

// Memory management
pub use mem::{PinnedHandle, Registry, RegistryGuard};

// Errors
pub use errors::{
    ConfigError, LookupError, ResumeError, SpawnError, SuspendError, ThreadError, ThreadResult,
};
