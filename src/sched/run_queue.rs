//! Run queue: the ordered set of runnable threads awaiting dispatch.

use crate::thread::ThreadId;

extern crate alloc;
use alloc::collections::VecDeque;

/// Ready-to-run collection consulted by the dispatcher.
///
/// Implementations only store identities; the matching `IN_RUN_QUEUE` flag
/// on each control block is maintained by the caller, which always holds
/// that thread's scheduling lock while calling [`push_back`](Self::push_back)
/// or [`remove`](Self::remove). The queue's own lock, if any, must be a
/// leaf: implementations never call back into the registry or a TCB.
pub trait RunQueue: Send + Sync {
    /// Append a thread; insertion order is scheduling order.
    fn push_back(&self, id: ThreadId);

    /// Remove a thread wherever it sits.
    ///
    /// # Returns
    ///
    /// `true` if the id was present.
    fn remove(&self, id: ThreadId) -> bool;

    /// The next thread the dispatcher would take, without removing it.
    fn front(&self) -> Option<ThreadId>;

    /// Number of queued threads.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: ThreadId) -> bool;
}

/// First-in first-out run queue behind a spin lock.
#[derive(Debug, Default)]
pub struct FifoRunQueue {
    queue: spin::Mutex<VecDeque<ThreadId>>,
}

impl FifoRunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: spin::Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl RunQueue for FifoRunQueue {
    fn push_back(&self, id: ThreadId) {
        let mut queue = self.queue.lock();
        debug_assert!(!queue.contains(&id), "thread {} queued twice", id);
        queue.push_back(id);
    }

    fn remove(&self, id: ThreadId) -> bool {
        let mut queue = self.queue.lock();
        match queue.iter().position(|&queued| queued == id) {
            Some(pos) => {
                queue.remove(pos);
                true
            }
            None => false,
        }
    }

    fn front(&self) -> Option<ThreadId> {
        self.queue.lock().front().copied()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }

    fn contains(&self, id: ThreadId) -> bool {
        self.queue.lock().contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = FifoRunQueue::new();
        assert!(queue.is_empty());
        assert!(queue.front().is_none());

        let a = ThreadId::from_parts(0, 1);
        let b = ThreadId::from_parts(1, 1);
        let c = ThreadId::from_parts(2, 1);
        queue.push_back(a);
        queue.push_back(b);
        queue.push_back(c);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front(), Some(a));

        assert!(queue.remove(b));
        assert!(!queue.remove(b));
        assert!(!queue.contains(b));
        assert!(queue.remove(a));
        assert_eq!(queue.front(), Some(c));
    }
}
