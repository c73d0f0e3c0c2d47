//! Concurrent registry of tab entries.
//!
//! The registry is the single writer-of-record for virtualization
//! metadata. Map operations take the outer lock briefly; per-record
//! state lives behind each entry's own locks so readers never observe
//! a partially-updated record.

use crate::record::VirtualRecord;
use crate::tab::{SharedTab, TabId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// One registered tab: the caller's shared tab, the engine's record,
/// and the per-record transition guard.
///
/// The transition mutex serializes hibernate and reactivate on this
/// tab. A reactivate arriving while a hibernate is in flight waits for
/// it to finish, then reverses it; the two never run concurrently.
pub(crate) struct TabEntry {
    pub tab: SharedTab,
    pub record: Mutex<VirtualRecord>,
    pub transition: tokio::sync::Mutex<()>,
}

impl TabEntry {
    pub fn new(tab: SharedTab, record: VirtualRecord) -> Self {
        Self {
            tab,
            record: Mutex::new(record),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    /// Clone the current record state.
    pub fn record_snapshot(&self) -> VirtualRecord {
        self.record.lock().unwrap().clone()
    }
}

/// Identity map from tab id to entry, plus the global counters that
/// back memory accounting.
pub(crate) struct Registry {
    entries: RwLock<HashMap<TabId, Arc<TabEntry>>>,
    hibernated_count: AtomicUsize,
    memory_saved: AtomicUsize,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hibernated_count: AtomicUsize::new(0),
            memory_saved: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, id: TabId, entry: Arc<TabEntry>) {
        self.entries.write().unwrap().insert(id, entry);
    }

    /// Remove an entry, rolling back counters if it was hibernated.
    /// Any attached snapshot is dropped with the entry.
    pub fn remove(&self, id: TabId) -> Option<Arc<TabEntry>> {
        let entry = self.entries.write().unwrap().remove(&id)?;
        let record = entry.record.lock().unwrap();
        if record.hibernated {
            self.hibernated_count.fetch_sub(1, Ordering::Relaxed);
            self.memory_saved
                .fetch_sub(record.hibernated_size, Ordering::Relaxed);
        }
        drop(record);
        Some(entry)
    }

    pub fn get(&self, id: TabId) -> Option<Arc<TabEntry>> {
        self.entries.read().unwrap().get(&id).cloned()
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.entries.read().unwrap().contains_key(&id)
    }

    /// Snapshot of all entries for a scan pass.
    pub fn entries(&self) -> Vec<Arc<TabEntry>> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn visible_count(&self) -> usize {
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|e| e.record.lock().unwrap().visible)
            .count()
    }

    pub fn hibernated_count(&self) -> usize {
        self.hibernated_count.load(Ordering::Relaxed)
    }

    pub fn memory_saved(&self) -> usize {
        self.memory_saved.load(Ordering::Relaxed)
    }

    /// Account one completed hibernation.
    pub fn record_hibernated(&self, bytes: usize) {
        self.hibernated_count.fetch_add(1, Ordering::Relaxed);
        self.memory_saved.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Account one completed (or failed) restore of a hibernation.
    pub fn record_reactivated(&self, bytes: usize) {
        self.hibernated_count.fetch_sub(1, Ordering::Relaxed);
        self.memory_saved.fetch_sub(bytes, Ordering::Relaxed);
    }
}
