//! Deduplicated hibernation-candidate queue.

use crate::tab::TabId;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// FIFO queue of tabs waiting for the hibernation sweep.
///
/// A tab is a member of at most one pending entry: pushing an id that
/// is already queued is a no-op.
#[derive(Debug, Default)]
pub(crate) struct CandidateQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    order: VecDeque<TabId>,
    queued: HashSet<TabId>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a candidate. Returns false if it was already queued.
    pub fn push(&self, id: TabId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.queued.insert(id) {
            return false;
        }
        inner.order.push_back(id);
        true
    }

    /// Dequeue up to `batch` candidates in FIFO order.
    pub fn drain(&self, batch: usize) -> Vec<TabId> {
        let mut inner = self.inner.lock().unwrap();
        let take = batch.min(inner.order.len());
        let mut ids = Vec::with_capacity(take);
        for _ in 0..take {
            if let Some(id) = inner.order.pop_front() {
                inner.queued.remove(&id);
                ids.push(id);
            }
        }
        ids
    }

    /// Drop a pending entry, if any. Used on unregister.
    pub fn remove(&self, id: TabId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.queued.remove(&id) {
            inner.order.retain(|queued| *queued != id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_deduplicates() {
        let queue = CandidateQueue::new();
        assert!(queue.push(TabId::new(1)));
        assert!(!queue.push(TabId::new(1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_is_fifo_and_bounded() {
        let queue = CandidateQueue::new();
        for i in 0..7 {
            queue.push(TabId::new(i));
        }
        let first = queue.drain(5);
        assert_eq!(first, (0..5).map(TabId::new).collect::<Vec<_>>());
        assert_eq!(queue.len(), 2);

        // Drained ids may be queued again
        assert!(queue.push(TabId::new(0)));
    }

    #[test]
    fn test_remove_clears_membership() {
        let queue = CandidateQueue::new();
        queue.push(TabId::new(3));
        queue.remove(TabId::new(3));
        assert_eq!(queue.len(), 0);
        assert!(queue.push(TabId::new(3)));
    }
}
