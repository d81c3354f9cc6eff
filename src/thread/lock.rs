//! Per-thread scheduling lock.
//!
//! Every write to a thread's `state`, its flags, or its run queue membership
//! happens through a [`SchedGuard`]. Lock order across the runtime is:
//!
//! 1. registry table lock
//! 2. per-thread scheduling lock (at most one, or two via [`lock_pair`])
//! 3. run queue lock
//!
//! Never acquire an outer lock while holding an inner one.

use super::{SchedFields, Tcb, ThreadFlags, ThreadId, ThreadSnapshot, ThreadState};
use portable_atomic::Ordering;

extern crate alloc;
use alloc::string::String;

/// Exclusive access to a thread's scheduling fields.
pub struct SchedGuard<'a> {
    tcb: &'a Tcb,
    fields: spin::MutexGuard<'a, SchedFields>,
}

impl<'a> SchedGuard<'a> {
    pub(crate) fn new(tcb: &'a Tcb) -> Self {
        Self {
            tcb,
            fields: tcb.sched.lock(),
        }
    }

    pub fn tcb(&self) -> &'a Tcb {
        self.tcb
    }

    pub fn id(&self) -> ThreadId {
        self.tcb.id()
    }

    pub fn state(&self) -> ThreadState {
        self.tcb.state()
    }

    pub(crate) fn set_state(&mut self, state: ThreadState) {
        let prev = self.tcb.state();
        debug_assert!(!prev.is_terminal() || prev == state, "terminal state {:?} left", prev);
        self.tcb.state.store(state as u8, Ordering::Release);
    }

    pub fn flags(&self) -> ThreadFlags {
        self.fields.flags
    }

    pub(crate) fn insert_flags(&mut self, flags: ThreadFlags) {
        self.fields.flags.insert(flags);
    }

    pub(crate) fn remove_flags(&mut self, flags: ThreadFlags) {
        self.fields.flags.remove(flags);
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.name.as_deref()
    }

    pub(crate) fn reset(&mut self, name: Option<String>, state: ThreadState) {
        self.fields.flags = ThreadFlags::empty();
        self.fields.name = name;
        self.tcb.state.store(state as u8, Ordering::Release);
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            id: self.id(),
            state: self.state(),
            flags: self.flags(),
            ref_count: self.tcb.ref_count(),
            critical_depth: self.tcb.critical_depth(),
            name: self.fields.name.clone(),
        }
    }

    /// `IN_RUN_QUEUE` implies `Runnable`; `Suspended` implies a pending
    /// suspend request.
    pub fn is_consistent(&self) -> bool {
        let flags = self.flags();
        let state = self.state();
        (!flags.contains(ThreadFlags::IN_RUN_QUEUE) || state == ThreadState::Runnable)
            && (state != ThreadState::Suspended || flags.contains(ThreadFlags::SUSPEND_REQUESTED))
    }
}

impl core::fmt::Debug for SchedGuard<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SchedGuard")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("flags", &self.flags())
            .finish()
    }
}

/// Lock two distinct threads in ascending [`ThreadId`] order.
///
/// Guards come back in argument order. Returns `None` if both arguments are
/// the same control block, which would otherwise self-deadlock.
pub fn lock_pair<'a>(a: &'a Tcb, b: &'a Tcb) -> Option<(SchedGuard<'a>, SchedGuard<'a>)> {
    if core::ptr::eq(a, b) {
        return None;
    }
    if a.id() <= b.id() {
        let first = a.lock();
        let second = b.lock();
        Some((first, second))
    } else {
        let second = b.lock();
        let first = a.lock();
        Some((first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied(index: u32) -> Tcb {
        let tcb = Tcb::vacant(index);
        tcb.generation.store(1, Ordering::Release);
        tcb.lock().reset(None, ThreadState::Runnable);
        tcb
    }

    #[test]
    fn test_guard_writes_state_and_flags() {
        let tcb = occupied(0);
        tcb.with_lock(|guard| {
            guard.set_state(ThreadState::Blocked);
            guard.insert_flags(ThreadFlags::SUSPEND_REQUESTED);
        });
        let snap = tcb.snapshot();
        assert_eq!(snap.state, ThreadState::Blocked);
        assert!(snap.suspend_requested());
        assert!(!snap.in_run_queue());
    }

    #[test]
    fn test_consistency_check() {
        let tcb = occupied(0);
        let mut guard = tcb.lock();
        assert!(guard.is_consistent());
        guard.set_state(ThreadState::Suspended);
        assert!(!guard.is_consistent());
        guard.insert_flags(ThreadFlags::SUSPEND_REQUESTED);
        assert!(guard.is_consistent());
        guard.set_state(ThreadState::Blocked);
        guard.insert_flags(ThreadFlags::IN_RUN_QUEUE);
        assert!(!guard.is_consistent());
    }

    #[test]
    fn test_lock_released_on_panic() {
        let tcb = occupied(0);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tcb.with_lock(|_guard| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(tcb.sched.try_lock().is_some());
    }

    #[test]
    fn test_lock_pair_rejects_same_tcb() {
        let tcb = occupied(0);
        assert!(lock_pair(&tcb, &tcb).is_none());
    }

    #[test]
    fn test_lock_pair_returns_argument_order() {
        let low = occupied(1);
        let high = occupied(2);
        let (a, b) = lock_pair(&high, &low).unwrap();
        assert_eq!(a.id(), high.id());
        assert_eq!(b.id(), low.id());
    }

    #[test]
    fn test_lock_pair_opposite_orders_do_not_deadlock() {
        let a = occupied(1);
        let b = occupied(2);
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..10_000 {
                    let _ = lock_pair(&a, &b);
                }
            });
            s.spawn(|| {
                for _ in 0..10_000 {
                    let _ = lock_pair(&b, &a);
                }
            });
        });
    }
}
