//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default size of a scheduled hibernation batch.
const DEFAULT_SWEEP_BATCH: usize = 5;

/// Default size of a memory-pressure hibernation batch.
const DEFAULT_PRESSURE_BATCH: usize = 10;

/// Configuration for the virtualization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtConfig {
    /// Upper bound on simultaneously visible tabs (>= 1).
    pub max_visible: usize,
    /// Reserved headroom above `max_visible`. Informational only;
    /// surfaced in logs, never used in eviction decisions.
    pub buffer_tabs: usize,
    /// How long a hidden tab must sit idle before the sweep hibernates
    /// it. Also the hibernation sweep interval.
    pub hibernation_delay: Duration,
    /// Interval between bookkeeping cleanup passes.
    pub cleanup_interval: Duration,
    /// How long access-time entries for unregistered tabs are retained.
    pub retention: Duration,
    /// Max tabs hibernated per scheduled sweep pass.
    pub sweep_batch: usize,
    /// Max tabs hibernated on a high-memory-pressure signal.
    pub pressure_batch: usize,
    /// Recency window that classifies a tab as High priority.
    pub high_window: Duration,
    /// Recency window that classifies a tab as Medium priority.
    pub medium_window: Duration,
}

impl Default for VirtConfig {
    fn default() -> Self {
        Self {
            max_visible: 20,
            buffer_tabs: 5,
            hibernation_delay: Duration::from_secs(120),
            cleanup_interval: Duration::from_secs(600),
            retention: Duration::from_secs(24 * 3600),
            sweep_batch: DEFAULT_SWEEP_BATCH,
            pressure_batch: DEFAULT_PRESSURE_BATCH,
            high_window: Duration::from_secs(5 * 60),
            medium_window: Duration::from_secs(30 * 60),
        }
    }
}

impl VirtConfig {
    /// Clamp nonsensical values to usable ones. `max_visible` of zero
    /// would make every registration invisible, including pinned tabs'
    /// neighbors, so it is raised to one.
    pub fn sanitized(mut self) -> Self {
        if self.max_visible == 0 {
            self.max_visible = 1;
        }
        if self.sweep_batch == 0 {
            self.sweep_batch = DEFAULT_SWEEP_BATCH;
        }
        if self.pressure_batch == 0 {
            self.pressure_batch = DEFAULT_PRESSURE_BATCH;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = VirtConfig::default();
        assert!(cfg.max_visible >= 1);
        assert!(cfg.high_window < cfg.medium_window);
    }

    #[test]
    fn test_sanitize_clamps_zeroes() {
        let cfg = VirtConfig {
            max_visible: 0,
            sweep_batch: 0,
            pressure_batch: 0,
            ..VirtConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.max_visible, 1);
        assert!(cfg.sweep_batch > 0);
        assert!(cfg.pressure_batch > 0);
    }
}
