//! Per-tab virtualization records.

use crate::priority::Priority;
use crate::snapshot::HibernationSnapshot;
use crate::tab::TabId;
use std::time::Instant;

/// Virtualization metadata for one registered tab.
///
/// Owned exclusively by the engine; callers see cloned snapshots of it
/// through [`crate::VirtEngine::get`], never a live reference.
#[derive(Debug, Clone)]
pub struct VirtualRecord {
    pub tab_id: TabId,
    /// Inside the bounded visible working set.
    pub visible: bool,
    /// Content released, snapshot attached.
    pub hibernated: bool,
    pub priority: Priority,
    pub last_accessed: Instant,
    pub access_count: u64,
    /// Present iff `hibernated`.
    pub snapshot: Option<HibernationSnapshot>,
    /// Bytes freed by the current hibernation, zero otherwise.
    pub hibernated_size: usize,
}

impl VirtualRecord {
    pub fn new(tab_id: TabId, priority: Priority, visible: bool) -> Self {
        Self {
            tab_id,
            visible,
            hibernated: false,
            priority,
            last_accessed: Instant::now(),
            access_count: 0,
            snapshot: None,
            hibernated_size: 0,
        }
    }

    /// Sort key for demotion and forced hibernation: lowest priority
    /// first, then least recently accessed.
    pub fn eviction_key(&self) -> (Priority, Instant) {
        (self.priority, self.last_accessed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_order_prefers_low_then_old() {
        let old_low = VirtualRecord::new(TabId::new(1), Priority::Low, false);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let new_low = VirtualRecord::new(TabId::new(2), Priority::Low, false);
        let high = VirtualRecord::new(TabId::new(3), Priority::High, false);

        let mut records = vec![&high, &new_low, &old_low];
        records.sort_by_key(|r| r.eviction_key());

        assert_eq!(records[0].tab_id, TabId::new(1));
        assert_eq!(records[1].tab_id, TabId::new(2));
        assert_eq!(records[2].tab_id, TabId::new(3));
    }

    #[test]
    fn test_fresh_record_is_not_hibernated() {
        let rec = VirtualRecord::new(TabId::new(9), Priority::High, true);
        assert!(!rec.hibernated);
        assert!(rec.snapshot.is_none());
        assert_eq!(rec.hibernated_size, 0);
    }
}
