//! Pinned references to thread control blocks.
//!
//! A pin is an atomic increment of the control block's `ref_count`. While
//! any pin is outstanding the registry will not reclaim the slot, even if
//! the thread finishes concurrently. Dropping the last pin on a terminal
//! thread reclaims it.

use super::registry::Registry;
use crate::thread::{SchedGuard, Tcb, ThreadId};
use portable_atomic::Ordering;

/// Sentinel `ref_count` while a reclaimer owns the slot.
pub(crate) const RECLAIMING: usize = usize::MAX;

/// RAII pin on a thread control block.
///
/// Obtained from [`Registry::pin`]. The decrement, and reclamation if this
/// was the last pin on a finished thread, happen exactly once on drop.
pub struct PinnedHandle<'r> {
    registry: &'r Registry,
    tcb: &'r Tcb,
}

impl<'r> PinnedHandle<'r> {
    /// Increment the pin count of `tcb` and wrap it.
    ///
    /// Waits out an in-flight reclamation rather than failing, so a pinner
    /// never mistakes a brief reclaim attempt on a live thread for absence.
    /// Callers must re-validate the generation afterwards.
    pub(crate) fn acquire(registry: &'r Registry, tcb: &'r Tcb) -> Self {
        let mut current = tcb.ref_count.load(Ordering::Acquire);
        loop {
            if current == RECLAIMING {
                core::hint::spin_loop();
                current = tcb.ref_count.load(Ordering::Acquire);
                continue;
            }

            match tcb.ref_count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        Self { registry, tcb }
    }

    /// Identity of the pinned thread.
    pub fn id(&self) -> ThreadId {
        self.tcb.id()
    }

    /// The pinned control block.
    pub fn tcb(&self) -> &'r Tcb {
        self.tcb
    }

    /// Acquire the pinned thread's scheduling lock.
    pub fn lock(&self) -> SchedGuard<'r> {
        self.tcb.lock()
    }
}

impl Clone for PinnedHandle<'_> {
    fn clone(&self) -> Self {
        // Already pinned, so the count cannot be zero or RECLAIMING here.
        let prev = self.tcb.ref_count.fetch_add(1, Ordering::AcqRel);
        debug_assert!(prev != 0 && prev != RECLAIMING);
        Self {
            registry: self.registry,
            tcb: self.tcb,
        }
    }
}

impl Drop for PinnedHandle<'_> {
    fn drop(&mut self) {
        self.registry.release(self.tcb);
    }
}

impl core::fmt::Debug for PinnedHandle<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("PinnedHandle").field(&self.id()).finish()
    }
}
