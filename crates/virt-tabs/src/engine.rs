//! The virtualization engine: registry operations, visibility
//! rebalancing, hibernation and reactivation, and backpressure
//! handlers.
//!
//! All state hangs off one explicitly-constructed engine value; there
//! are no process-wide singletons. Clones share the same state, so the
//! engine can be handed to background tasks cheaply.

use crate::config::VirtConfig;
use crate::error::EngineError;
use crate::events::{VirtEvent, VirtStats};
use crate::priority::{classify, Priority, TabSignals};
use crate::queue::CandidateQueue;
use crate::record::VirtualRecord;
use crate::registry::{Registry, TabEntry};
use crate::snapshot::{self, CapturedState};
use crate::sweeper::{spawn_sweepers, SweeperHandle};
use crate::tab::{ContentLoader, LifecycleState, SharedTab, Tab, TabId};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

/// Most hibernate/reactivate notifications held for observers. Events
/// past this are dropped rather than growing the queue while nobody
/// drains it.
const EVENT_QUEUE_CAP: usize = 1024;

/// Adaptive tab virtualization engine.
///
/// Keeps at most `max_visible` tabs in the active working set,
/// hibernating hidden idle tabs in the background and reactivating
/// them on demand. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct VirtEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: VirtConfig,
    registry: Registry,
    candidates: CandidateQueue,
    /// Access-time bookkeeping, kept past unregister until the cleanup
    /// sweep purges entries older than the retention window.
    last_seen: Mutex<HashMap<TabId, Instant>>,
    /// Serializes visible-set edits: optimize_visibility runs one at a
    /// time even when called concurrently with itself.
    visibility: tokio::sync::Mutex<()>,
    loader: Option<Arc<dyn ContentLoader>>,
    events_tx: Sender<VirtEvent>,
    events_rx: Receiver<VirtEvent>,
    /// Set when counters change; the next poll appends one coalesced
    /// `StatsUpdated` instead of queueing one per mutation.
    stats_dirty: AtomicBool,
}

impl VirtEngine {
    /// Create an engine with no content loader. Tabs registered without
    /// content stay empty until the caller supplies it.
    pub fn new(config: VirtConfig) -> Self {
        Self::build(config, None)
    }

    /// Create an engine that lazily loads content through `loader` the
    /// first time an empty tab is activated.
    pub fn with_loader(config: VirtConfig, loader: Arc<dyn ContentLoader>) -> Self {
        Self::build(config, Some(loader))
    }

    fn build(config: VirtConfig, loader: Option<Arc<dyn ContentLoader>>) -> Self {
        let config = config.sanitized();
        let (events_tx, events_rx) = bounded(EVENT_QUEUE_CAP);
        info!(
            max_visible = config.max_visible,
            buffer_tabs = config.buffer_tabs,
            "virtualization engine initialized"
        );
        Self {
            inner: Arc::new(EngineInner {
                config,
                registry: Registry::new(),
                candidates: CandidateQueue::new(),
                last_seen: Mutex::new(HashMap::new()),
                visibility: tokio::sync::Mutex::new(()),
                loader,
                events_tx,
                events_rx,
                stats_dirty: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &VirtConfig {
        &self.inner.config
    }

    /// Spawn the background hibernation and cleanup sweeps.
    pub fn start(&self) -> SweeperHandle {
        spawn_sweepers(self.clone())
    }

    // ---- registry operations ----

    /// Register a tab. The initial visibility decision is made before
    /// this returns: active/pinned tabs are always visible, others are
    /// visible only while the working set has room. Hidden
    /// registrations are queued for the hibernation sweep.
    pub fn register(&self, tab: SharedTab) -> TabId {
        let (id, signals) = {
            let tab = tab.lock().unwrap();
            (tab.id, signals_of(&tab))
        };
        let priority = classify(signals, false, &self.inner.config);
        let visible = signals.active
            || signals.pinned
            || self.inner.registry.visible_count() < self.inner.config.max_visible;

        let record = VirtualRecord::new(id, priority, visible);
        self.inner
            .registry
            .insert(id, Arc::new(TabEntry::new(tab, record)));
        self.inner.last_seen.lock().unwrap().insert(id, Instant::now());
        if !visible {
            self.inner.candidates.push(id);
        }

        info!(%id, ?priority, visible, "registered tab");
        self.emit_stats();
        id
    }

    /// Remove a tab from the engine, dropping its record and any
    /// pending snapshot. Returns false if the tab was not registered.
    pub fn unregister(&self, id: TabId) -> bool {
        let removed = self.inner.registry.remove(id).is_some();
        if removed {
            self.inner.candidates.remove(id);
            info!(%id, "unregistered tab");
            self.emit_stats();
        }
        removed
    }

    /// Cloned snapshot of a tab's virtualization record.
    pub fn get(&self, id: TabId) -> Option<VirtualRecord> {
        self.inner.registry.get(id).map(|e| e.record_snapshot())
    }

    // ---- activation ----

    /// Bring a tab into the visible working set.
    ///
    /// By the time this returns the tab is visible and not hibernated:
    /// a pending reactivation is awaited, not fire-and-forget, and an
    /// empty tab is loaded through the content loader. A failed restore
    /// is contained (reported via [`VirtEvent::TabReactivated`] with
    /// the failure flag); the tab is then in
    /// [`LifecycleState::Error`] and must be re-registered.
    pub async fn activate(&self, id: TabId) -> Result<(), EngineError> {
        let entry = self
            .inner
            .registry
            .get(id)
            .ok_or(EngineError::TabNotFound(id))?;

        {
            let _guard = entry.transition.lock().await;

            let signals = {
                let mut tab = entry.tab.lock().unwrap();
                tab.last_activated = Instant::now();
                signals_of(&tab)
            };
            {
                let mut record = entry.record.lock().unwrap();
                record.last_accessed = Instant::now();
                record.access_count += 1;
                record.priority = classify(signals, true, &self.inner.config);
            }

            let hibernated = entry.record.lock().unwrap().hibernated;
            if hibernated {
                // Restore failures are contained: logged and surfaced
                // via the event channel, the record left non-hibernated.
                let _ = self.reactivate_locked(&entry).await;
            } else {
                self.load_if_empty(&entry).await?;
            }

            entry.record.lock().unwrap().visible = true;
        }

        self.inner.last_seen.lock().unwrap().insert(id, Instant::now());
        self.rebalance(Some(id)).await;
        Ok(())
    }

    /// Run the `InitializeAsync` hook for a tab with no content yet.
    async fn load_if_empty(&self, entry: &TabEntry) -> Result<(), EngineError> {
        let Some(loader) = self.inner.loader.as_ref() else {
            return Ok(());
        };
        let id = {
            let tab = entry.tab.lock().unwrap();
            if tab.content.is_some() {
                return Ok(());
            }
            tab.id
        };

        entry.tab.lock().unwrap().lifecycle = LifecycleState::Loading;
        debug!(%id, "loading tab content");
        match loader.initialize(id).await {
            Ok(content) => {
                let mut tab = entry.tab.lock().unwrap();
                tab.content = Some(content);
                tab.lifecycle = LifecycleState::Normal;
                Ok(())
            }
            Err(e) => {
                entry.tab.lock().unwrap().lifecycle = LifecycleState::Error;
                warn!(%id, error = %e, "content load failed");
                Err(EngineError::LoadFailed {
                    id,
                    reason: e.to_string(),
                })
            }
        }
    }

    // ---- visibility rebalancing ----

    /// Enforce the visible bound: demote low-priority visible tabs when
    /// over budget, promote the best hidden tabs (reactivating them if
    /// needed) when under it. Idempotent and internally serialized;
    /// safe to call at any time.
    pub async fn optimize_visibility(&self) {
        self.rebalance(None).await;
    }

    /// Rebalance the visible set. `keep_visible` names a record that an
    /// in-flight activation just promoted; it is exempt from demotion
    /// so the activation's visibility guarantee holds on return even
    /// when every other visible tab is Critical.
    async fn rebalance(&self, keep_visible: Option<TabId>) {
        let _vis = self.inner.visibility.lock().await;

        let max = self.inner.config.max_visible;
        let mut visible = Vec::new();
        let mut hidden = Vec::new();
        for entry in self.inner.registry.entries() {
            // Classify from the tab's current flags: a pin or focus set
            // after registration must hold off demotion now, not after
            // the next activate refreshes the cached priority.
            let signals = {
                let tab = entry.tab.lock().unwrap();
                signals_of(&tab)
            };
            let record = {
                let mut record = entry.record.lock().unwrap();
                record.priority = classify(signals, false, &self.inner.config);
                record.clone()
            };
            if record.visible {
                visible.push((entry, record));
            } else {
                hidden.push((entry, record));
            }
        }
        let total = visible.len() + hidden.len();

        if visible.len() > max {
            let excess = visible.len() - max;
            let mut demotable: Vec<_> = visible
                .into_iter()
                .filter(|(_, r)| {
                    r.priority != Priority::Critical && keep_visible != Some(r.tab_id)
                })
                .collect();
            demotable.sort_by_key(|(_, r)| r.eviction_key());

            for (entry, record) in demotable.into_iter().take(excess) {
                let (active, pinned) = {
                    let tab = entry.tab.lock().unwrap();
                    (tab.active, tab.pinned)
                };
                if active || pinned {
                    // Flag flipped since classification above.
                    continue;
                }
                entry.record.lock().unwrap().visible = false;
                self.inner.candidates.push(record.tab_id);
                debug!(id = %record.tab_id, priority = ?record.priority, "demoted tab");
            }
        } else if visible.len() < max.min(total) {
            let shortfall = max.min(total) - visible.len();
            hidden.sort_by(|a, b| b.1.eviction_key().cmp(&a.1.eviction_key()));

            for (entry, record) in hidden.into_iter().take(shortfall) {
                entry.record.lock().unwrap().visible = true;
                if entry.record.lock().unwrap().hibernated {
                    let _guard = entry.transition.lock().await;
                    // may have been reactivated while we waited
                    if entry.record.lock().unwrap().hibernated {
                        let _ = self.reactivate_locked(&entry).await;
                    }
                }
                debug!(id = %record.tab_id, priority = ?record.priority, "promoted tab");
            }
        }

        self.emit_stats();
    }

    // ---- hibernation ----

    /// Hibernate one tab, awaiting its transition guard first. Used by
    /// the sweep and the backpressure path.
    pub(crate) async fn hibernate_entry(&self, entry: &TabEntry) -> Result<usize, EngineError> {
        let _guard = entry.transition.lock().await;
        self.hibernate_locked(entry)
    }

    /// Capture a snapshot and release the tab's content. Caller holds
    /// the transition guard. Preconditions are re-checked here so a
    /// tab activated between scheduling and execution is skipped.
    fn hibernate_locked(&self, entry: &TabEntry) -> Result<usize, EngineError> {
        let (id, state) = {
            let tab = entry.tab.lock().unwrap();
            if tab.active || tab.pinned {
                return Err(EngineError::NotEligible(tab.id));
            }
            let Some(content) = tab.content.clone() else {
                return Err(EngineError::NotEligible(tab.id));
            };
            (
                tab.id,
                CapturedState {
                    content,
                    view: tab.view.clone(),
                    metadata: tab.metadata.clone(),
                },
            )
        };
        if entry.record.lock().unwrap().hibernated {
            return Err(EngineError::NotEligible(id));
        }

        let snap = match snapshot::capture(&state) {
            Ok(snap) => snap,
            Err(e) => {
                // Abandoned: the tab keeps its content and stays
                // non-hibernated; the next sweep retries.
                warn!(%id, error = %e, "snapshot capture failed");
                return Err(EngineError::CaptureFailed {
                    id,
                    reason: e.to_string(),
                });
            }
        };
        let bytes = snap.size_estimate;

        {
            let mut tab = entry.tab.lock().unwrap();
            tab.content = None;
            tab.lifecycle = LifecycleState::Hibernated;
        }
        {
            let mut record = entry.record.lock().unwrap();
            record.hibernated = true;
            record.hibernated_size = bytes;
            record.snapshot = Some(snap);
            record.visible = false;
        }
        self.inner.registry.record_hibernated(bytes);

        info!(%id, bytes_freed = bytes, "hibernated tab");
        self.send(VirtEvent::TabHibernated {
            id,
            bytes_freed: bytes,
            timestamp: SystemTime::now(),
        });
        self.emit_stats();
        Ok(bytes)
    }

    /// Restore a hibernated tab's content. Caller holds the transition
    /// guard. On failure the snapshot is discarded, the tab moves to
    /// [`LifecycleState::Error`] and is not retried.
    pub(crate) async fn reactivate_locked(&self, entry: &TabEntry) -> Result<usize, EngineError> {
        let start = Instant::now();
        let (id, snap) = {
            let mut record = entry.record.lock().unwrap();
            let id = record.tab_id;
            match record.snapshot.take() {
                Some(snap) => (id, snap),
                None => return Err(EngineError::NotHibernated(id)),
            }
        };
        let bytes = snap.size_estimate;

        match snapshot::restore(&snap) {
            Ok(state) => {
                {
                    let mut tab = entry.tab.lock().unwrap();
                    tab.content = Some(state.content);
                    tab.view = state.view;
                    tab.metadata = state.metadata;
                    tab.lifecycle = LifecycleState::Normal;
                }
                {
                    let mut record = entry.record.lock().unwrap();
                    record.hibernated = false;
                    record.hibernated_size = 0;
                }
                self.inner.registry.record_reactivated(bytes);

                let elapsed = start.elapsed();
                info!(%id, bytes_restored = bytes, ?elapsed, "reactivated tab");
                self.send(VirtEvent::TabReactivated {
                    id,
                    elapsed,
                    bytes_restored: bytes,
                    failed: false,
                });
                self.emit_stats();
                Ok(bytes)
            }
            Err(e) => {
                entry.tab.lock().unwrap().lifecycle = LifecycleState::Error;
                {
                    let mut record = entry.record.lock().unwrap();
                    record.hibernated = false;
                    record.hibernated_size = 0;
                }
                self.inner.registry.record_reactivated(bytes);

                warn!(%id, error = %e, "restore failed; tab must be re-registered");
                self.send(VirtEvent::TabReactivated {
                    id,
                    elapsed: start.elapsed(),
                    bytes_restored: 0,
                    failed: true,
                });
                self.emit_stats();
                Err(EngineError::RestoreFailed {
                    id,
                    reason: e.to_string(),
                })
            }
        }
    }

    // ---- background sweeps ----

    /// One hibernation sweep pass: drain a batch of candidates,
    /// re-check eligibility, hibernate the survivors. Returns the
    /// number of tabs hibernated.
    pub async fn run_hibernation_sweep(&self) -> usize {
        let ids = self.inner.candidates.drain(self.inner.config.sweep_batch);
        let mut hibernated = 0;
        for id in ids {
            let Some(entry) = self.inner.registry.get(id) else {
                continue;
            };
            let record = entry.record_snapshot();
            // Promoted or already hibernated since it was queued.
            if record.visible || record.hibernated {
                continue;
            }
            let (active, pinned) = {
                let tab = entry.tab.lock().unwrap();
                (tab.active, tab.pinned)
            };
            if active || pinned {
                continue;
            }
            if record.last_accessed.elapsed() <= self.inner.config.hibernation_delay {
                // Not idle long enough yet; look again next pass.
                self.inner.candidates.push(id);
                continue;
            }

            match self.hibernate_entry(&entry).await {
                Ok(_) => hibernated += 1,
                Err(EngineError::CaptureFailed { .. }) => {
                    self.inner.candidates.push(id);
                }
                Err(e) => debug!(%id, error = %e, "sweep skipped tab"),
            }
        }
        if hibernated > 0 {
            debug!(hibernated, pending = self.inner.candidates.len(), "hibernation sweep done");
        }
        hibernated
    }

    /// One cleanup pass: drop access-time entries for tabs no longer
    /// registered, once they age past the retention window. Live
    /// records are never touched. Returns the number purged.
    pub fn run_cleanup_sweep(&self) -> usize {
        let retention = self.inner.config.retention;
        let registry = &self.inner.registry;
        let mut last_seen = self.inner.last_seen.lock().unwrap();
        let before = last_seen.len();
        last_seen.retain(|id, seen| registry.contains(*id) || seen.elapsed() <= retention);
        let purged = before - last_seen.len();
        if purged > 0 {
            debug!(purged, "cleanup sweep purged stale access entries");
        }
        purged
    }

    // ---- backpressure ----

    /// Handle a high-memory-pressure signal: hibernate a larger batch
    /// of the coldest non-Critical tabs right away. Dispatches to a
    /// background task; never blocks the caller. Must be invoked from
    /// within a tokio runtime context.
    pub fn on_high_memory_pressure(&self) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.pressure_hibernate().await;
        });
    }

    /// Handle a frequent-GC signal with a cheap, non-destructive
    /// rebalance pass. Must be invoked from within a tokio runtime
    /// context.
    pub fn on_frequent_gc(&self) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.optimize_visibility().await;
        });
    }

    /// Immediately hibernate up to `pressure_batch` eligible tabs,
    /// coldest first.
    pub async fn pressure_hibernate(&self) -> usize {
        let mut eligible = Vec::new();
        for entry in self.inner.registry.entries() {
            let record = entry.record_snapshot();
            if record.hibernated || record.priority == Priority::Critical {
                continue;
            }
            let skip = {
                let tab = entry.tab.lock().unwrap();
                tab.active || tab.pinned || tab.content.is_none()
            };
            if skip {
                continue;
            }
            eligible.push((entry, record));
        }
        eligible.sort_by_key(|(_, r)| r.eviction_key());

        let mut hibernated = 0;
        for (entry, record) in eligible.into_iter().take(self.inner.config.pressure_batch) {
            match self.hibernate_entry(&entry).await {
                Ok(_) => hibernated += 1,
                Err(e) => debug!(id = %record.tab_id, error = %e, "pressure hibernation skipped"),
            }
        }
        if hibernated > 0 {
            warn!(hibernated, "memory pressure: forced hibernation batch");
        }
        hibernated
    }

    // ---- observation ----

    pub fn stats(&self) -> VirtStats {
        let total = self.inner.registry.len();
        VirtStats {
            total_tabs: total,
            visible_tabs: self.inner.registry.visible_count(),
            hibernated_tabs: self.inner.registry.hibernated_count(),
            memory_saved_bytes: self.inner.registry.memory_saved(),
            virtualization_active: total > self.inner.config.max_visible,
        }
    }

    /// Drain all pending events (non-blocking). When counters changed
    /// since the last drain, a single [`VirtEvent::StatsUpdated`] with
    /// the current numbers is appended at the end.
    pub fn poll_events(&self) -> Vec<VirtEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.inner.events_rx.try_recv() {
            events.push(event);
        }
        if self.inner.stats_dirty.swap(false, Ordering::AcqRel) {
            events.push(VirtEvent::StatsUpdated(self.stats()));
        }
        events
    }

    fn emit_stats(&self) {
        self.inner.stats_dirty.store(true, Ordering::Release);
    }

    fn send(&self, event: VirtEvent) {
        if self.inner.events_tx.try_send(event).is_err() {
            debug!("event queue full; dropping notification");
        }
    }
}

fn signals_of(tab: &Tab) -> TabSignals {
    TabSignals {
        active: tab.active,
        pinned: tab.pinned,
        unsaved_changes: tab.unsaved_changes,
        idle: tab.idle_time(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::HibernationSnapshot;
    use crate::tab::TabContent;
    use std::time::Duration;

    fn test_config() -> VirtConfig {
        VirtConfig {
            max_visible: 3,
            hibernation_delay: Duration::ZERO,
            ..VirtConfig::default()
        }
    }

    fn content(bytes: usize) -> TabContent {
        TabContent {
            dom: vec![7u8; bytes],
            js_heap: None,
            form_data: Vec::new(),
        }
    }

    fn shared_tab(id: u64, bytes: usize) -> SharedTab {
        Arc::new(Mutex::new(Tab::with_content(TabId::new(id), content(bytes))))
    }

    #[tokio::test]
    async fn test_register_respects_visible_budget() {
        let engine = VirtEngine::new(test_config());
        for i in 0..5 {
            engine.register(shared_tab(i, 100));
        }
        let stats = engine.stats();
        assert_eq!(stats.total_tabs, 5);
        assert_eq!(stats.visible_tabs, 3);
        assert_eq!(stats.hibernated_tabs, 0);
        assert!(stats.virtualization_active);
    }

    #[tokio::test]
    async fn test_unregister_rolls_back_accounting() {
        let engine = VirtEngine::new(test_config());
        for i in 0..4 {
            engine.register(shared_tab(i, 1000));
        }
        engine.run_hibernation_sweep().await;
        let stats = engine.stats();
        assert_eq!(stats.hibernated_tabs, 1);
        assert_eq!(stats.memory_saved_bytes, 1000);

        assert!(engine.unregister(TabId::new(3)));
        let stats = engine.stats();
        assert_eq!(stats.hibernated_tabs, 0);
        assert_eq!(stats.memory_saved_bytes, 0);
        assert!(!engine.unregister(TabId::new(3)));
    }

    #[tokio::test]
    async fn test_sweep_skips_reactivated_candidates() {
        let engine = VirtEngine::new(test_config());
        for i in 0..4 {
            engine.register(shared_tab(i, 100));
        }
        // Tab 3 is the hidden candidate; activating it promotes it and
        // demotes another, so the original queue entry must be ignored.
        engine.activate(TabId::new(3)).await.unwrap();
        let rec = engine.get(TabId::new(3)).unwrap();
        assert!(rec.visible);
        assert!(!rec.hibernated);

        engine.run_hibernation_sweep().await;
        assert!(!engine.get(TabId::new(3)).unwrap().hibernated);
    }

    #[tokio::test]
    async fn test_restore_failure_is_contained() {
        let engine = VirtEngine::new(test_config());
        let id = engine.register(shared_tab(1, 100));
        let entry = engine.inner.registry.get(id).unwrap();

        // Simulate a hibernated record whose snapshot got corrupted.
        {
            let mut tab = entry.tab.lock().unwrap();
            tab.content = None;
            tab.lifecycle = LifecycleState::Hibernated;
        }
        {
            let mut record = entry.record.lock().unwrap();
            record.hibernated = true;
            record.hibernated_size = 64;
            record.snapshot = Some(HibernationSnapshot::corrupt(64));
        }
        engine.inner.registry.record_hibernated(64);

        // Activate completes despite the failed restore.
        engine.activate(id).await.unwrap();

        let record = engine.get(id).unwrap();
        assert!(!record.hibernated);
        assert!(record.snapshot.is_none());
        assert_eq!(entry.tab.lock().unwrap().lifecycle, LifecycleState::Error);
        assert_eq!(engine.stats().memory_saved_bytes, 0);

        let failed = engine.poll_events().into_iter().any(|e| {
            matches!(e, VirtEvent::TabReactivated { failed: true, .. })
        });
        assert!(failed, "expected a failed TabReactivated event");
    }

    #[tokio::test]
    async fn test_cleanup_sweep_purges_only_stale_unregistered() {
        let config = VirtConfig {
            retention: Duration::ZERO,
            ..test_config()
        };
        let engine = VirtEngine::new(config);
        engine.register(shared_tab(1, 10));
        engine.register(shared_tab(2, 10));
        engine.unregister(TabId::new(2));

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(engine.run_cleanup_sweep(), 1);
        // Live record's bookkeeping survives.
        assert_eq!(engine.run_cleanup_sweep(), 0);
    }

    #[tokio::test]
    async fn test_activate_stays_visible_beside_critical_neighbors() {
        let config = VirtConfig {
            max_visible: 1,
            hibernation_delay: Duration::ZERO,
            ..VirtConfig::default()
        };
        let engine = VirtEngine::new(config);

        let pinned = shared_tab(1, 100);
        pinned.lock().unwrap().pinned = true;
        engine.register(pinned);

        // The whole budget is held by a Critical tab, so the rebalance
        // after activation has nobody demotable; the activated tab must
        // still be visible when the call returns.
        let id = engine.register(shared_tab(2, 100));
        engine.activate(id).await.unwrap();

        let record = engine.get(id).unwrap();
        assert!(record.visible);
        assert!(!record.hibernated);

        // Its stale queue entry from registration is ignored too.
        engine.run_hibernation_sweep().await;
        assert!(!engine.get(id).unwrap().hibernated);
        assert!(engine.get(id).unwrap().visible);
    }

    #[tokio::test]
    async fn test_pin_after_register_survives_rebalance() {
        let config = VirtConfig {
            max_visible: 2,
            hibernation_delay: Duration::ZERO,
            ..VirtConfig::default()
        };
        let engine = VirtEngine::new(config);

        let a = shared_tab(1, 100);
        let a_id = engine.register(a.clone());
        let b_id = engine.register(shared_tab(2, 100));

        // Pinned after registration: the cached priority still says
        // High, but the rebalance must see the current flag.
        a.lock().unwrap().pinned = true;

        let c_id = engine.register(shared_tab(3, 100));
        engine.activate(c_id).await.unwrap();

        assert!(engine.get(a_id).unwrap().visible, "pinned tab was demoted");
        assert!(!engine.get(b_id).unwrap().visible);
        assert!(engine.get(c_id).unwrap().visible);
    }

    #[tokio::test]
    async fn test_poll_events_coalesces_stats() {
        let engine = VirtEngine::new(test_config());
        for i in 0..30 {
            engine.register(shared_tab(i, 10));
        }

        let events = engine.poll_events();
        let stats: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                VirtEvent::StatsUpdated(stats) => Some(stats),
                _ => None,
            })
            .collect();
        assert_eq!(stats.len(), 1, "stats notifications must coalesce");
        assert_eq!(stats[0].total_tabs, 30);

        // Nothing pending once drained with no further changes.
        assert!(engine.poll_events().is_empty());
    }

    #[tokio::test]
    async fn test_activate_unknown_tab() {
        let engine = VirtEngine::new(test_config());
        assert!(matches!(
            engine.activate(TabId::new(42)).await,
            Err(EngineError::TabNotFound(_))
        ));
    }
}
