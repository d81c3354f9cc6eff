//! Non-preemptible regions.
//!
//! On a cooperative runtime "blocking asynchronous preemption" means the
//! dispatcher's preemption hook and upcall delivery must not act on the
//! thread while it is inside a section. Requests that arrive in the
//! meantime are parked as `DEFERRED` and turned into a pending yield when
//! the outermost section ends.

use crate::thread::{Pending, Tcb};
use portable_atomic::Ordering;

/// Scoped critical section for one thread. Sections nest.
pub struct CriticalSection<'a> {
    tcb: &'a Tcb,
}

impl<'a> CriticalSection<'a> {
    /// Enter a critical section on behalf of `tcb`.
    ///
    /// Only the thread that owns `tcb` should do this; the runtime hands out
    /// sections through [`Running::critical_section`](crate::Running::critical_section).
    pub(crate) fn enter(tcb: &'a Tcb) -> Self {
        tcb.critical_depth.fetch_add(1, Ordering::AcqRel);
        Self { tcb }
    }

    /// Current nesting depth, including this section.
    pub fn depth(&self) -> u32 {
        self.tcb.critical_depth()
    }
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        let prev = self.tcb.critical_depth.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "critical section underflow");
        if prev == 1 && !self.tcb.take_pending(Pending::DEFERRED).is_empty() {
            self.tcb.post_pending(Pending::YIELD);
        }
    }
}

impl core::fmt::Debug for CriticalSection<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CriticalSection")
            .field("thread", &self.tcb.id())
            .field("depth", &self.depth())
            .finish()
    }
}

/// How an asynchronous request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Visible to the target at its next yield check.
    Immediate,
    /// Held until the target leaves its critical section.
    Deferred,
}

/// Post an asynchronous preemption or upcall to `tcb`.
pub(crate) fn deliver(tcb: &Tcb) -> Delivery {
    // Post first, then check the depth: whichever side takes DEFERRED
    // publishes the yield, so a concurrent section exit cannot lose it.
    tcb.post_pending(Pending::DEFERRED);
    if tcb.critical_depth() == 0 && !tcb.take_pending(Pending::DEFERRED).is_empty() {
        tcb.post_pending(Pending::YIELD);
        Delivery::Immediate
    } else {
        Delivery::Deferred
    }
}

/// Whether `tcb` has a deliverable yield request.
pub(crate) fn yield_pending(tcb: &Tcb) -> bool {
    tcb.critical_depth() == 0 && tcb.has_pending(Pending::YIELD)
}
