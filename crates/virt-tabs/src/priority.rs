//! Priority classification for eviction and promotion decisions.

use crate::config::VirtConfig;
use std::time::Duration;

/// Coarse priority class. Ordering matters: eviction walks ascending,
/// promotion walks descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Inputs to classification, read from a tab under its lock.
#[derive(Debug, Clone, Copy)]
pub struct TabSignals {
    pub active: bool,
    pub pinned: bool,
    pub unsaved_changes: bool,
    pub idle: Duration,
}

/// Classify a tab. Pure: same inputs always yield the same class.
///
/// Active or pinned tabs are Critical and exempt from hibernation and
/// demotion. An in-flight activation counts as recent use.
pub fn classify(signals: TabSignals, activating: bool, config: &VirtConfig) -> Priority {
    if signals.active || signals.pinned {
        return Priority::Critical;
    }
    if activating || signals.idle < config.high_window {
        return Priority::High;
    }
    if signals.unsaved_changes || signals.idle < config.medium_window {
        return Priority::Medium;
    }
    Priority::Low
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(idle_secs: u64) -> TabSignals {
        TabSignals {
            active: false,
            pinned: false,
            unsaved_changes: false,
            idle: Duration::from_secs(idle_secs),
        }
    }

    #[test]
    fn test_active_or_pinned_is_critical() {
        let cfg = VirtConfig::default();
        let mut s = signals(10_000);
        s.active = true;
        assert_eq!(classify(s, false, &cfg), Priority::Critical);
        s.active = false;
        s.pinned = true;
        assert_eq!(classify(s, false, &cfg), Priority::Critical);
    }

    #[test]
    fn test_recency_windows() {
        let cfg = VirtConfig::default();
        assert_eq!(classify(signals(60), false, &cfg), Priority::High);
        assert_eq!(classify(signals(10 * 60), false, &cfg), Priority::Medium);
        assert_eq!(classify(signals(60 * 60), false, &cfg), Priority::Low);
    }

    #[test]
    fn test_activating_is_high_even_when_stale() {
        let cfg = VirtConfig::default();
        assert_eq!(classify(signals(60 * 60), true, &cfg), Priority::High);
    }

    #[test]
    fn test_unsaved_changes_raise_stale_tab_to_medium() {
        let cfg = VirtConfig::default();
        let mut s = signals(60 * 60);
        s.unsaved_changes = true;
        assert_eq!(classify(s, false, &cfg), Priority::Medium);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }
}
