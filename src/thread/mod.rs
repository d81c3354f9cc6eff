//! Thread control blocks and identities.
//!
//! A [`Tcb`] lives in a fixed registry slot for the lifetime of the runtime;
//! the logical thread occupying it changes as threads are created and
//! reclaimed. The slot's generation tells occupants apart, so a
//! [`ThreadId`] naming a previous occupant is detected as stale without
//! any timing assumptions.

use bitflags::bitflags;
use core::num::NonZeroU64;
use portable_atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

extern crate alloc;
use alloc::string::String;

pub mod builder;
pub mod handle;
pub mod lock;

pub use builder::ThreadBuilder;
pub use handle::Running;
pub use lock::{lock_pair, SchedGuard};

/// Unique identifier for threads.
///
/// Packs the registry slot index (low 32 bits) and the slot generation
/// (high 32 bits). Generations of occupied slots are odd, so an issued id is
/// never zero and never collides with a later occupant of the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroU64);

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.index(), self.generation())
    }
}

impl ThreadId {
    /// Only called with the odd generation of an occupied slot, which keeps
    /// `raw` nonzero. The fallback is slot 1 at generation 0; lookups reject
    /// even generations, so it can never resolve to a thread.
    pub(crate) fn from_parts(index: u32, generation: u32) -> Self {
        debug_assert!(generation & 1 == 1, "ids are only issued for occupied slots");
        let raw = (u64::from(generation) << 32) | u64::from(index);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Build an id that was never issued, such as one naming a vacant slot.
    #[cfg(test)]
    pub(crate) fn from_raw_parts(index: u32, generation: u32) -> Self {
        let raw = (u64::from(generation) << 32) | u64::from(index);
        Self(NonZeroU64::new(raw).unwrap())
    }

    /// Registry slot this thread occupies.
    pub fn index(self) -> u32 {
        self.0.get() as u32
    }

    /// Slot generation at the time the thread was created.
    pub fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    /// Get the ID as u64.
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }
}

/// Thread scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadState {
    /// On the run queue, waiting for a virtual CPU
    Runnable = 0,
    /// Executing on a virtual CPU
    Running = 1,
    /// Waiting on something other than the scheduler
    Blocked = 2,
    /// Held off the run queue by a suspend request
    Suspended = 3,
    /// Teardown in progress
    Exiting = 4,
    /// Finished; terminal
    Dead = 5,
    /// Stopped on an unrecoverable lock cycle; terminal
    Deadlocked = 6,
}

impl ThreadState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ThreadState::Runnable,
            1 => ThreadState::Running,
            2 => ThreadState::Blocked,
            3 => ThreadState::Suspended,
            4 => ThreadState::Exiting,
            6 => ThreadState::Deadlocked,
            _ => ThreadState::Dead,
        }
    }

    /// `Dead` and `Deadlocked` never leave their state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ThreadState::Dead | ThreadState::Deadlocked)
    }
}

bitflags! {
    /// Scheduling attributes independent of [`ThreadState`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ThreadFlags: u8 {
        /// Sticky suspend request; survives block/unblock and yield.
        const SUSPEND_REQUESTED = 1 << 0;
        /// The id is present in the run queue.
        const IN_RUN_QUEUE = 1 << 1;
        /// Teardown has begun.
        const EXITING = 1 << 2;
    }
}

bitflags! {
    /// Asynchronous requests waiting on a thread's critical section.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct Pending: u8 {
        /// Delivered while inside a critical section; not yet visible.
        const DEFERRED = 1 << 0;
        /// Visible to the thread at its next yield check.
        const YIELD = 1 << 1;
    }
}

/// Fields guarded by the per-thread scheduling lock.
#[derive(Debug, Default)]
pub(crate) struct SchedFields {
    pub(crate) flags: ThreadFlags,
    pub(crate) name: Option<String>,
}

/// Thread control block.
///
/// `state` is an atomic so that lock-free readers (pinning, snapshots) can
/// observe it, but it is only ever written through a [`SchedGuard`].
pub struct Tcb {
    pub(crate) index: u32,
    pub(crate) generation: AtomicU32,
    pub(crate) ref_count: AtomicUsize,
    pub(crate) state: AtomicU8,
    pub(crate) critical_depth: AtomicU32,
    pub(crate) pending: AtomicU8,
    pub(crate) sched: spin::Mutex<SchedFields>,
}

impl Tcb {
    pub(crate) fn vacant(index: u32) -> Self {
        Self {
            index,
            generation: AtomicU32::new(0),
            ref_count: AtomicUsize::new(0),
            state: AtomicU8::new(ThreadState::Dead as u8),
            critical_depth: AtomicU32::new(0),
            pending: AtomicU8::new(0),
            sched: spin::Mutex::new(SchedFields::default()),
        }
    }

    /// Identity of the current occupant.
    pub fn id(&self) -> ThreadId {
        ThreadId::from_parts(self.index, self.generation.load(Ordering::Acquire))
    }

    pub(crate) fn is_occupied(&self) -> bool {
        self.generation.load(Ordering::Acquire) & 1 == 1
    }

    /// Get the thread's current state.
    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of outstanding pins.
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Nesting depth of the thread's critical sections.
    pub fn critical_depth(&self) -> u32 {
        self.critical_depth.load(Ordering::Acquire)
    }

    /// Acquire the per-thread scheduling lock.
    pub fn lock(&self) -> SchedGuard<'_> {
        SchedGuard::new(self)
    }

    /// Run `f` with the scheduling lock held.
    ///
    /// The lock is released on every exit path, including unwinding.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut SchedGuard<'_>) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub(crate) fn post_pending(&self, bits: Pending) {
        self.pending.fetch_or(bits.bits(), Ordering::AcqRel);
    }

    pub(crate) fn take_pending(&self, bits: Pending) -> Pending {
        let prev = self.pending.fetch_and(!bits.bits(), Ordering::AcqRel);
        Pending::from_bits_truncate(prev) & bits
    }

    pub(crate) fn has_pending(&self, bits: Pending) -> bool {
        Pending::from_bits_truncate(self.pending.load(Ordering::Acquire)).intersects(bits)
    }

    /// Consistent view of the thread, taken under its lock.
    pub fn snapshot(&self) -> ThreadSnapshot {
        self.with_lock(|guard| guard.snapshot())
    }
}

impl core::fmt::Debug for Tcb {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tcb")
            .field("index", &self.index)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("state", &self.state())
            .field("ref_count", &self.ref_count())
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of one thread, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub id: ThreadId,
    pub state: ThreadState,
    pub flags: ThreadFlags,
    pub ref_count: usize,
    pub critical_depth: u32,
    pub name: Option<String>,
}

impl ThreadSnapshot {
    pub fn in_run_queue(&self) -> bool {
        self.flags.contains(ThreadFlags::IN_RUN_QUEUE)
    }

    pub fn suspend_requested(&self) -> bool {
        self.flags.contains(ThreadFlags::SUSPEND_REQUESTED)
    }
}
