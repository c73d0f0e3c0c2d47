//! Resource-pressure monitoring.
//!
//! Polls the process RSS and drives the engine's backpressure handlers
//! when memory pressure rises or GC pauses become frequent. Signals
//! are rate-limited so a sustained spike cannot flood the engine with
//! forced hibernation batches.

use crate::engine::VirtEngine;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default RSS threshold before forced hibernation kicks in.
const DEFAULT_RSS_THRESHOLD: usize = 512 * 1024 * 1024;

/// How often to poll RSS
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Most backpressure signals delivered in any rolling minute.
const DEFAULT_SIGNALS_PER_MINUTE: usize = 6;

/// GC pauses per rolling minute that count as "frequent".
const DEFAULT_GC_PER_MINUTE: usize = 10;

/// Errors from pressure monitoring
#[derive(Debug, Error)]
pub enum PressureError {
    #[error("failed to get process info")]
    ProcessNotFound,

    #[error("monitor already running")]
    AlreadyRunning,
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressureLevel {
    /// Under 50% of threshold, normal operation
    Low,
    /// 50-80% of threshold, consider hibernating
    Medium,
    /// 80-100% of threshold, aggressively hibernate
    High,
    /// Over threshold, critical
    Critical,
}

impl MemoryPressureLevel {
    /// Determine pressure level from RSS and threshold
    pub fn from_usage(current_rss: usize, threshold: usize) -> Self {
        let ratio = current_rss as f64 / threshold as f64;
        if ratio >= 1.0 {
            Self::Critical
        } else if ratio >= 0.8 {
            Self::High
        } else if ratio >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Configuration for the pressure monitor.
#[derive(Debug, Clone)]
pub struct PressureConfig {
    /// RSS at which pressure is considered critical.
    pub rss_threshold: usize,
    /// RSS polling cadence.
    pub poll_interval: Duration,
    /// Ceiling on backpressure signals per rolling minute.
    pub max_signals_per_minute: usize,
    /// GC pauses per rolling minute that trigger a rebalance.
    pub gc_per_minute: usize,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            rss_threshold: DEFAULT_RSS_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_signals_per_minute: DEFAULT_SIGNALS_PER_MINUTE,
            gc_per_minute: DEFAULT_GC_PER_MINUTE,
        }
    }
}

/// Sliding one-minute window used to bound signal delivery.
#[derive(Debug, Default)]
struct MinuteWindow {
    events: Mutex<VecDeque<Instant>>,
}

impl MinuteWindow {
    /// Record an event; returns how many fell within the last minute.
    fn record(&self) -> usize {
        let mut events = self.events.lock().unwrap();
        let now = Instant::now();
        events.push_back(now);
        while let Some(front) = events.front() {
            if now.duration_since(*front) > Duration::from_secs(60) {
                events.pop_front();
            } else {
                break;
            }
        }
        events.len()
    }
}

/// Watches process RSS and GC frequency, feeding the engine's
/// backpressure handlers. Optional: the engine works without it, and
/// hosts with their own resource monitor can call the handlers
/// directly.
pub struct PressureMonitor {
    config: PressureConfig,
    engine: VirtEngine,
    runtime: tokio::runtime::Handle,
    running: Arc<AtomicBool>,
    current_rss: Arc<AtomicUsize>,
    signals: Arc<MinuteWindow>,
    gc_pauses: MinuteWindow,
}

impl PressureMonitor {
    pub fn new(config: PressureConfig, engine: VirtEngine, runtime: tokio::runtime::Handle) -> Self {
        Self {
            config,
            engine,
            runtime,
            running: Arc::new(AtomicBool::new(false)),
            current_rss: Arc::new(AtomicUsize::new(0)),
            signals: Arc::new(MinuteWindow::default()),
            gc_pauses: MinuteWindow::default(),
        }
    }

    /// Last sampled RSS in bytes.
    pub fn current_rss(&self) -> usize {
        self.current_rss.load(Ordering::Relaxed)
    }

    /// Read this process's RSS once.
    pub fn read_rss_sync() -> Result<usize, PressureError> {
        let mut system = System::new_with_specifics(RefreshKind::everything());
        let pid = Pid::from_u32(std::process::id());
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        system
            .process(pid)
            .map(|p| p.memory() as usize)
            .ok_or(PressureError::ProcessNotFound)
    }

    /// Report one GC pause. When pauses become frequent within the last
    /// minute, the engine gets a (rate-limited) frequent-GC signal.
    pub fn record_gc_pause(&self) {
        let in_window = self.gc_pauses.record();
        if in_window >= self.config.gc_per_minute {
            if self.signals.record() <= self.config.max_signals_per_minute {
                debug!(gc_pauses = in_window, "frequent GC detected");
                let _enter = self.runtime.enter();
                self.engine.on_frequent_gc();
            }
        }
    }

    /// Start the RSS polling thread.
    pub fn start(&self) -> Result<thread::JoinHandle<()>, PressureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(PressureError::AlreadyRunning);
        }

        let running = self.running.clone();
        let current_rss = self.current_rss.clone();
        let signals = self.signals.clone();
        let config = self.config.clone();
        let engine = self.engine.clone();
        let runtime = self.runtime.clone();

        let handle = thread::Builder::new()
            .name("pressure-monitor".to_string())
            .spawn(move || {
                info!(threshold = config.rss_threshold, "pressure monitor started");

                let mut system = System::new_with_specifics(RefreshKind::everything());
                let pid = Pid::from_u32(std::process::id());
                let mut last_level = MemoryPressureLevel::Low;

                while running.load(Ordering::Relaxed) {
                    system.refresh_processes_specifics(
                        sysinfo::ProcessesToUpdate::Some(&[pid]),
                        true,
                        ProcessRefreshKind::everything(),
                    );

                    if let Some(process) = system.process(pid) {
                        let rss = process.memory() as usize;
                        current_rss.store(rss, Ordering::Relaxed);

                        let level = MemoryPressureLevel::from_usage(rss, config.rss_threshold);
                        if level != last_level {
                            info!(?last_level, ?level, rss, "memory pressure changed");
                            last_level = level;
                        }

                        if level >= MemoryPressureLevel::High
                            && signals.record() <= config.max_signals_per_minute
                        {
                            warn!(rss, ?level, "high memory pressure; forcing hibernation");
                            let _enter = runtime.enter();
                            engine.on_high_memory_pressure();
                        }
                    }

                    thread::sleep(config.poll_interval);
                }

                info!("pressure monitor stopped");
            })
            .expect("failed to spawn pressure monitor thread");

        Ok(handle)
    }

    /// Stop the polling thread.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for PressureMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_levels() {
        let threshold = 1000;
        assert_eq!(
            MemoryPressureLevel::from_usage(400, threshold),
            MemoryPressureLevel::Low
        );
        assert_eq!(
            MemoryPressureLevel::from_usage(600, threshold),
            MemoryPressureLevel::Medium
        );
        assert_eq!(
            MemoryPressureLevel::from_usage(900, threshold),
            MemoryPressureLevel::High
        );
        assert_eq!(
            MemoryPressureLevel::from_usage(1100, threshold),
            MemoryPressureLevel::Critical
        );
    }

    #[test]
    fn test_read_rss() {
        let rss = PressureMonitor::read_rss_sync().unwrap();
        assert!(rss > 0);
    }

    #[test]
    fn test_minute_window_counts() {
        let window = MinuteWindow::default();
        assert_eq!(window.record(), 1);
        assert_eq!(window.record(), 2);
        assert_eq!(window.record(), 3);
    }
}
