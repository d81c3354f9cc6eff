//! Dispatcher boundary.
//!
//! The runtime does not context-switch; an embedding dispatcher does. These
//! hooks are the transitions it reports back, and each one keeps run queue
//! membership, `state` and the sticky suspend request consistent under the
//! thread's own lock.

use super::critical::{self, Delivery};
use super::run_queue::RunQueue;
use super::suspend::make_runnable;
use crate::errors::LookupError;
use crate::runtime::Runtime;
use crate::thread::{Pending, Running, ThreadFlags, ThreadId, ThreadState};

/// What the dispatcher found at the front of the run queue.
enum Claim {
    Taken,
    Suspended,
    Stale,
    Lost,
}

impl<Q: RunQueue> Runtime<Q> {
    /// Take the next runnable thread and mark it `Running`.
    ///
    /// Ids whose thread has gone away are dropped from the queue with a
    /// warning. Returns `None` once the queue is empty.
    pub fn dispatch(&self) -> Option<Running<'_>> {
        loop {
            let id = self.run_queue().front()?;

            let pin = match self.registry().pin(id, false) {
                Ok(pin) => pin,
                Err(LookupError::NotFound) => {
                    if self.run_queue().remove(id) {
                        log::warn!("[{}] dropped stale thread {} from run queue", self.name(), id);
                    }
                    continue;
                }
            };

            let claim = pin.tcb().with_lock(|guard| {
                if !self.run_queue().remove(id) {
                    return Claim::Lost;
                }
                if !guard.flags().contains(ThreadFlags::IN_RUN_QUEUE) {
                    return Claim::Stale;
                }
                guard.remove_flags(ThreadFlags::IN_RUN_QUEUE);
                if guard.flags().contains(ThreadFlags::SUSPEND_REQUESTED) {
                    guard.set_state(ThreadState::Suspended);
                    Claim::Suspended
                } else {
                    guard.set_state(ThreadState::Running);
                    Claim::Taken
                }
            });

            match claim {
                Claim::Taken => {
                    pin.tcb().take_pending(Pending::YIELD);
                    log::trace!("[{}] dispatch {}", self.name(), id);
                    return Some(Running::new(pin, self.run_queue()));
                }
                Claim::Suspended => {
                    log::trace!("[{}] dispatch found {} suspended", self.name(), id);
                }
                Claim::Stale => {
                    log::warn!("[{}] thread {} queued without its flag", self.name(), id);
                }
                // Another dispatcher or a suspend got there first.
                Claim::Lost => {}
            }
        }
    }

    /// Give up the CPU and go back in line, or stop if suspension was
    /// requested meanwhile.
    pub fn yield_now(&self, running: Running<'_>) -> ThreadState {
        let pin = running.into_pin();
        pin.tcb().take_pending(Pending::YIELD);
        let state = pin.tcb().with_lock(|guard| {
            debug_assert_eq!(guard.state(), ThreadState::Running);
            make_runnable(guard, self.run_queue())
        });
        log::trace!("[{}] {} yielded -> {:?}", self.name(), pin.id(), state);
        drop(pin);
        state
    }

    /// Stop running until [`unblock`](Self::unblock) is called.
    pub fn block(&self, running: Running<'_>) {
        let pin = running.into_pin();
        pin.tcb().with_lock(|guard| guard.set_state(ThreadState::Blocked));
        log::trace!("[{}] {} blocked", self.name(), pin.id());
        drop(pin);
    }

    /// Wake a blocked thread.
    ///
    /// The thread becomes `Runnable`, or `Suspended` if a suspend request
    /// is pending. A thread that is not blocked is left alone. Returns the
    /// thread's state afterwards.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] if `id` is stale or terminal.
    pub fn unblock(&self, id: ThreadId) -> Result<ThreadState, LookupError> {
        let pin = self.registry().pin(id, false)?;
        let state = pin.tcb().with_lock(|guard| {
            if guard.state() == ThreadState::Blocked {
                make_runnable(guard, self.run_queue())
            } else {
                guard.state()
            }
        });
        drop(pin);
        log::trace!("[{}] unblock {} -> {:?}", self.name(), id, state);
        Ok(state)
    }

    /// Tear the calling thread down.
    ///
    /// `EXITING` goes up first so concurrent suspend and resume calls treat
    /// the thread as moot; the slot is reclaimed once the last pin is gone.
    pub fn exit(&self, running: Running<'_>) {
        let pin = running.into_pin();
        let id = pin.id();
        pin.tcb().with_lock(|guard| {
            guard.insert_flags(ThreadFlags::EXITING);
            guard.set_state(ThreadState::Exiting);
        });
        log::trace!("[{}] {} exiting", self.name(), id);

        pin.tcb().with_lock(|guard| {
            debug_assert!(!guard.flags().contains(ThreadFlags::IN_RUN_QUEUE));
            guard.set_state(ThreadState::Dead);
        });
        log::trace!("[{}] {} dead", self.name(), id);
        drop(pin);
    }

    /// Park the calling thread permanently in `Deadlocked`.
    pub fn deadlock(&self, running: Running<'_>) {
        let pin = running.into_pin();
        pin.tcb().with_lock(|guard| guard.set_state(ThreadState::Deadlocked));
        log::debug!("[{}] {} deadlocked", self.name(), pin.id());
        drop(pin);
    }

    /// Post an asynchronous preemption request to `target`.
    ///
    /// Held back while the target is inside a critical section.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] if `target` is stale or terminal.
    pub fn interrupt(&self, target: ThreadId) -> Result<Delivery, LookupError> {
        let pin = self.registry().pin(target, false)?;
        let delivery = critical::deliver(pin.tcb());
        drop(pin);
        log::trace!("[{}] interrupt {}: {:?}", self.name(), target, delivery);
        Ok(delivery)
    }
}
