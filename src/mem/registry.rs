//! Process-wide thread registry.
//!
//! The registry is an arena of [`Tcb`] slots allocated once at start-up.
//! Slot addresses never move, which is what lets a pinned reference outlive
//! the registry lock. The lock-protected table only tracks which slots are
//! live and which are free.

use super::pin::{PinnedHandle, RECLAIMING};
use crate::config::RuntimeConfig;
use crate::errors::{LookupError, SpawnError};
use crate::thread::{SchedGuard, Tcb, ThreadId, ThreadState};
use portable_atomic::Ordering;

extern crate alloc;
use alloc::{boxed::Box, string::String, vec::Vec};

struct Table {
    live: Vec<u32>,
    free: Vec<u32>,
}

/// Arena of thread control blocks with generation-checked lookup.
pub struct Registry {
    slots: Box<[Tcb]>,
    table: spin::Mutex<Table>,
    name: &'static str,
}

impl Registry {
    pub fn new(config: &RuntimeConfig) -> Self {
        let capacity = config.capacity();
        let slots: Vec<Tcb> = (0..capacity).map(Tcb::vacant).collect();
        // Popped from the back, so low indices are handed out first.
        let free: Vec<u32> = (0..capacity).rev().collect();

        Self {
            slots: slots.into_boxed_slice(),
            table: spin::Mutex::new(Table {
                live: Vec::with_capacity(config.max_threads()),
                free,
            }),
            name: config.name(),
        }
    }

    /// Number of slots in the arena.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live (not yet reclaimed) threads.
    pub fn len(&self) -> usize {
        self.table.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim a vacant slot for a new `Runnable` thread.
    ///
    /// `init` runs with the registry lock and the new thread's scheduling
    /// lock both held, before any other thread can observe the slot.
    pub(crate) fn insert(
        &self,
        name: Option<String>,
        init: impl FnOnce(&mut SchedGuard<'_>),
    ) -> Result<ThreadId, SpawnError> {
        let mut table = self.table.lock();
        let index = table.free.pop().ok_or(SpawnError::TooManyThreads)?;
        let tcb = &self.slots[index as usize];
        debug_assert!(!tcb.is_occupied());
        // The count need not be zero here. A lookup racing with reuse may
        // hold a stray pin on the vacant slot, and a release that lost the
        // race to reclaim may briefly hold `RECLAIMING` while it waits for
        // the table lock. Both re-check the generation and back off without
        // touching the new occupant.

        let mut guard = tcb.lock();
        let generation = tcb.generation.load(Ordering::Acquire).wrapping_add(1);
        tcb.generation.store(generation, Ordering::Release);
        guard.reset(name, ThreadState::Runnable);
        init(&mut guard);
        table.live.push(index);

        let id = guard.id();
        log::debug!("[{}] registered thread {}", self.name, id);
        Ok(id)
    }

    /// Pin the thread named by `id`.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] if the id is stale or names a vacant slot,
    /// or if `include_dead` is false and the thread is already `Dead` or
    /// `Deadlocked`.
    ///
    /// Must not be called with the registry lock held.
    pub fn pin(&self, id: ThreadId, include_dead: bool) -> Result<PinnedHandle<'_>, LookupError> {
        // Vacant slots carry even generations; no such id was ever issued.
        if id.generation() & 1 == 0 {
            return Err(LookupError::NotFound);
        }
        let tcb = self
            .slots
            .get(id.index() as usize)
            .ok_or(LookupError::NotFound)?;

        // From here on, dropping `pin` undoes the increment.
        let pin = PinnedHandle::acquire(self, tcb);
        if tcb.generation.load(Ordering::Acquire) != id.generation() {
            return Err(LookupError::NotFound);
        }
        if !include_dead && tcb.state().is_terminal() {
            return Err(LookupError::NotFound);
        }
        Ok(pin)
    }

    /// Slot currently holding `id`, without pinning it.
    pub(crate) fn slot(&self, id: ThreadId) -> Option<&Tcb> {
        self.slots
            .get(id.index() as usize)
            .filter(|tcb| {
                tcb.is_occupied() && tcb.generation.load(Ordering::Acquire) == id.generation()
            })
    }

    /// Acquire the registry's global lock for enumeration.
    ///
    /// While the guard is held no thread can be created or reclaimed, so
    /// the control blocks it yields are safe to lock without pinning.
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            registry: self,
            table: self.table.lock(),
        }
    }

    pub(crate) fn release(&self, tcb: &Tcb) {
        let prev = tcb.ref_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev != 0 && prev != RECLAIMING, "unbalanced release");
        if prev == 1 {
            self.try_reclaim(tcb);
        }
    }

    /// Return a finished, unpinned thread's slot to the free list.
    pub(crate) fn try_reclaim(&self, tcb: &Tcb) -> bool {
        let generation = tcb.generation.load(Ordering::Acquire);
        if generation & 1 == 0 || !tcb.state().is_terminal() {
            return false;
        }
        if tcb
            .ref_count
            .compare_exchange(0, RECLAIMING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let reclaimed = {
            let mut table = self.table.lock();
            if tcb.generation.load(Ordering::Acquire) == generation && tcb.state().is_terminal() {
                let id = tcb.id();
                let mut guard = tcb.lock();
                guard.reset(None, ThreadState::Dead);
                tcb.critical_depth.store(0, Ordering::Release);
                tcb.pending.store(0, Ordering::Release);
                tcb.generation.store(generation.wrapping_add(1), Ordering::Release);
                drop(guard);

                if let Some(pos) = table.live.iter().position(|&i| i == tcb.index) {
                    table.live.swap_remove(pos);
                }
                table.free.push(tcb.index);
                log::debug!("[{}] reclaimed thread {}", self.name, id);
                true
            } else {
                false
            }
        };

        tcb.ref_count.store(0, Ordering::Release);
        reclaimed
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// Held registry lock; enumerates live control blocks.
pub struct RegistryGuard<'a> {
    registry: &'a Registry,
    table: spin::MutexGuard<'a, Table>,
}

impl<'a> RegistryGuard<'a> {
    /// Every live control block, in no particular order.
    pub fn threads(&self) -> impl Iterator<Item = &'a Tcb> + '_ {
        let registry: &'a Registry = self.registry;
        let slots: &'a [Tcb] = &registry.slots;
        self.table.live.iter().map(move |&index| &slots[index as usize])
    }

    pub fn len(&self) -> usize {
        self.table.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.live.is_empty()
    }
}
