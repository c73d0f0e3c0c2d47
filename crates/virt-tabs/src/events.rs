//! Events emitted by the engine for observers.

use crate::tab::TabId;
use std::time::{Duration, SystemTime};

/// Aggregate engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtStats {
    pub total_tabs: usize,
    pub visible_tabs: usize,
    pub hibernated_tabs: usize,
    /// Sum of `hibernated_size` over all currently-hibernated records.
    pub memory_saved_bytes: usize,
    /// True when the population exceeds the visible budget.
    pub virtualization_active: bool,
}

/// Notifications delivered through [`crate::VirtEngine::poll_events`].
#[derive(Debug, Clone)]
pub enum VirtEvent {
    /// A tab's content was released to a snapshot.
    TabHibernated {
        id: TabId,
        bytes_freed: usize,
        timestamp: SystemTime,
    },
    /// A tab's content was restored, or a restore failed.
    TabReactivated {
        id: TabId,
        elapsed: Duration,
        bytes_restored: usize,
        failed: bool,
    },
    /// Counters changed.
    StatsUpdated(VirtStats),
}
