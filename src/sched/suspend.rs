//! Suspend engine.
//!
//! Suspension is a sticky request (`SUSPEND_REQUESTED`) plus, when the
//! target is sitting on the run queue, an immediate transition to
//! `Suspended`. A target that is running or blocked keeps its state and is
//! caught the next time it would become runnable; see [`make_runnable`].
//!
//! Per-thread steps run under that thread's scheduling lock and never
//! yield. Races with thread exit resolve to a successful no-op.

use super::run_queue::RunQueue;
use crate::errors::{ResumeError, SuspendError};
use crate::runtime::Runtime;
use crate::thread::{Running, SchedGuard, ThreadFlags, ThreadId, ThreadState};

/// Result of applying a suspend request to one locked thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendOutcome {
    /// Taken off the run queue and now `Suspended`.
    Dequeued,
    /// Running or blocked; will stop at its next scheduling point.
    Requested,
    /// Request was already in effect.
    AlreadySuspended,
    /// Exiting or terminal; nothing to do.
    Moot,
}

/// Result of applying a resume request to one locked thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Was `Suspended`; back on the run queue.
    Requeued,
    /// Pending request withdrawn before it took effect.
    Withdrawn,
    /// No request to withdraw.
    NotSuspended,
    /// Exiting or terminal; nothing to do.
    Moot,
}

fn is_moot(guard: &SchedGuard<'_>) -> bool {
    guard.state().is_terminal()
        || guard.state() == ThreadState::Exiting
        || guard.flags().contains(ThreadFlags::EXITING)
}

/// Put a locked thread back in line, honouring a pending suspend request.
///
/// Every transition into `Runnable` goes through here, which is what makes
/// the sticky flag effective for threads that were running or blocked when
/// the request arrived.
pub(crate) fn make_runnable<Q: RunQueue + ?Sized>(guard: &mut SchedGuard<'_>, run_queue: &Q) -> ThreadState {
    debug_assert!(!guard.flags().contains(ThreadFlags::IN_RUN_QUEUE));
    if guard.flags().contains(ThreadFlags::SUSPEND_REQUESTED) {
        guard.set_state(ThreadState::Suspended);
    } else {
        guard.set_state(ThreadState::Runnable);
        guard.insert_flags(ThreadFlags::IN_RUN_QUEUE);
        run_queue.push_back(guard.id());
    }
    debug_assert!(guard.is_consistent());
    guard.state()
}

pub(crate) fn suspend_locked<Q: RunQueue + ?Sized>(guard: &mut SchedGuard<'_>, run_queue: &Q) -> SuspendOutcome {
    if is_moot(guard) {
        return SuspendOutcome::Moot;
    }
    if guard.state() == ThreadState::Suspended {
        debug_assert!(guard.flags().contains(ThreadFlags::SUSPEND_REQUESTED));
        return SuspendOutcome::AlreadySuspended;
    }

    let already_requested = guard.flags().contains(ThreadFlags::SUSPEND_REQUESTED);
    guard.insert_flags(ThreadFlags::SUSPEND_REQUESTED);

    let outcome = if guard.flags().contains(ThreadFlags::IN_RUN_QUEUE) {
        let removed = run_queue.remove(guard.id());
        debug_assert!(removed, "IN_RUN_QUEUE set but thread {} not queued", guard.id());
        guard.remove_flags(ThreadFlags::IN_RUN_QUEUE);
        guard.set_state(ThreadState::Suspended);
        SuspendOutcome::Dequeued
    } else if already_requested {
        SuspendOutcome::AlreadySuspended
    } else {
        SuspendOutcome::Requested
    };

    debug_assert!(guard.is_consistent());
    outcome
}

pub(crate) fn resume_locked<Q: RunQueue + ?Sized>(guard: &mut SchedGuard<'_>, run_queue: &Q) -> ResumeOutcome {
    if is_moot(guard) {
        return ResumeOutcome::Moot;
    }

    let was_requested = guard.flags().contains(ThreadFlags::SUSPEND_REQUESTED);
    guard.remove_flags(ThreadFlags::SUSPEND_REQUESTED);

    if guard.state() == ThreadState::Suspended {
        make_runnable(guard, run_queue);
        ResumeOutcome::Requeued
    } else if was_requested {
        ResumeOutcome::Withdrawn
    } else {
        ResumeOutcome::NotSuspended
    }
}

/// Tally of a bulk sweep, for logging.
#[derive(Debug, Default, Clone, Copy)]
struct Sweep {
    visited: usize,
    changed: usize,
    skipped: usize,
}

impl<Q: RunQueue> Runtime<Q> {
    /// Suspend one other thread.
    ///
    /// A runnable target is off the run queue before this returns. A running
    /// or blocked target is flagged and becomes `Suspended` at its next
    /// yield, unblock, or dispatch. Repeating the call is harmless.
    ///
    /// # Errors
    ///
    /// - [`SuspendError::SelfSuspend`] if `target` is the caller.
    /// - [`SuspendError::NotFound`] if `target` is stale or already terminal.
    ///
    /// A target that starts exiting after the lookup yields `Ok(())`.
    pub fn suspend_one(&self, caller: &Running<'_>, target: ThreadId) -> Result<(), SuspendError> {
        if target == caller.id() {
            return Err(SuspendError::SelfSuspend);
        }

        let pin = self.registry().pin(target, false)?;
        let outcome = pin
            .tcb()
            .with_lock(|guard| suspend_locked(guard, self.run_queue()));
        drop(pin);

        log::trace!("[{}] {} suspend {}: {:?}", self.name(), caller.id(), target, outcome);
        Ok(())
    }

    /// Suspend every thread except the caller.
    ///
    /// Runs inside a critical section for the caller with the registry lock
    /// held, so no thread can be created or reclaimed mid-sweep. Threads
    /// found exiting or terminal are skipped.
    pub fn suspend_all(&self, caller: &Running<'_>) {
        let section = caller.critical_section();
        let registry = self.registry().lock();
        let me = caller.id();

        let mut sweep = Sweep::default();
        for tcb in registry.threads() {
            let outcome = tcb.with_lock(|guard| {
                (guard.id() != me).then(|| suspend_locked(guard, self.run_queue()))
            });
            match outcome {
                None => continue,
                Some(SuspendOutcome::Moot) => sweep.skipped += 1,
                Some(SuspendOutcome::Dequeued | SuspendOutcome::Requested) => sweep.changed += 1,
                Some(SuspendOutcome::AlreadySuspended) => {}
            }
            sweep.visited += 1;
        }

        drop(registry);
        drop(section);
        log::debug!(
            "[{}] {} suspended all: {} visited, {} newly suspended, {} skipped",
            self.name(),
            me,
            sweep.visited,
            sweep.changed,
            sweep.skipped
        );
    }

    /// Withdraw a suspend request from a thread.
    ///
    /// A `Suspended` target goes back on the run queue. A target that was
    /// only flagged loses the flag and carries on. The caller may name
    /// itself, which clears a request that has not yet taken effect.
    ///
    /// # Errors
    ///
    /// [`ResumeError::NotFound`] if `target` is stale or already terminal.
    pub fn resume_one(&self, caller: &Running<'_>, target: ThreadId) -> Result<(), ResumeError> {
        let pin = self.registry().pin(target, false)?;
        let outcome = pin
            .tcb()
            .with_lock(|guard| resume_locked(guard, self.run_queue()));
        drop(pin);

        log::trace!("[{}] {} resume {}: {:?}", self.name(), caller.id(), target, outcome);
        Ok(())
    }

    /// Resume every thread except the caller.
    pub fn resume_all(&self, caller: &Running<'_>) {
        let section = caller.critical_section();
        let registry = self.registry().lock();
        let me = caller.id();

        let mut sweep = Sweep::default();
        for tcb in registry.threads() {
            let outcome = tcb.with_lock(|guard| {
                (guard.id() != me).then(|| resume_locked(guard, self.run_queue()))
            });
            match outcome {
                None => continue,
                Some(ResumeOutcome::Moot) => sweep.skipped += 1,
                Some(ResumeOutcome::Requeued | ResumeOutcome::Withdrawn) => sweep.changed += 1,
                Some(ResumeOutcome::NotSuspended) => {}
            }
            sweep.visited += 1;
        }

        drop(registry);
        drop(section);
        log::debug!(
            "[{}] {} resumed all: {} visited, {} resumed, {} skipped",
            self.name(),
            me,
            sweep.visited,
            sweep.changed,
            sweep.skipped
        );
    }
}
