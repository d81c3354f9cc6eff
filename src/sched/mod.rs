//! Scheduling: run queue, critical sections, dispatcher hooks, and the
//! suspend engine.

pub mod critical;
pub mod dispatch;
pub mod run_queue;
pub mod suspend;

pub use critical::{CriticalSection, Delivery};
pub use run_queue::{FifoRunQueue, RunQueue};
pub use suspend::{ResumeOutcome, SuspendOutcome};
