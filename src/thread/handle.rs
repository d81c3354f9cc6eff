use super::{Pending, Tcb, ThreadId, ThreadState};
use crate::mem::PinnedHandle;
use crate::sched::critical::{self, CriticalSection};
use crate::sched::suspend::make_runnable;
use crate::sched::RunQueue;

/// The calling thread, as seen by the runtime.
///
/// Handed out by [`Runtime::dispatch`](crate::Runtime::dispatch) when a
/// thread is put on a virtual CPU and consumed when it gives the CPU back
/// (yield, block, exit). It pins its own control block, so a running thread
/// can never be reclaimed from under itself. Operations that need to know
/// who is calling take `&Running`.
///
/// Dropping the token without handing it back counts as a yield: the thread
/// goes to the back of the run queue, or to `Suspended` if a suspend request
/// is pending. Never drop one while holding the registry lock or a
/// scheduling lock.
#[must_use = "dropping a Running token yields the thread back to the run queue"]
pub struct Running<'r> {
    pin: PinnedHandle<'r>,
    run_queue: &'r dyn RunQueue,
    handed_back: bool,
}

impl<'r> Running<'r> {
    pub(crate) fn new(pin: PinnedHandle<'r>, run_queue: &'r dyn RunQueue) -> Self {
        Self {
            pin,
            run_queue,
            handed_back: false,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.pin.id()
    }

    pub(crate) fn tcb(&self) -> &'r Tcb {
        self.pin.tcb()
    }

    /// Consume the token for an explicit transition. The returned pin keeps
    /// the control block alive until the caller is done with it.
    pub(crate) fn into_pin(mut self) -> PinnedHandle<'r> {
        self.handed_back = true;
        self.pin.clone()
    }

    /// Block asynchronous preemption of this thread until the guard drops.
    pub fn critical_section(&self) -> CriticalSection<'r> {
        CriticalSection::enter(self.tcb())
    }

    /// Whether a preemption request is waiting and no critical section is
    /// active. Cooperative code polls this at its safe points.
    pub fn should_yield(&self) -> bool {
        critical::yield_pending(self.tcb())
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        if self.handed_back {
            return;
        }
        let tcb = self.pin.tcb();
        tcb.take_pending(Pending::YIELD);
        let state = tcb.with_lock(|guard| {
            if guard.state() == ThreadState::Running {
                Some(make_runnable(guard, self.run_queue))
            } else {
                None
            }
        });
        if let Some(state) = state {
            log::trace!("{} dropped while running -> {:?}", tcb.id(), state);
        }
    }
}

impl core::fmt::Debug for Running<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Running").field(&self.id()).finish()
    }
}
