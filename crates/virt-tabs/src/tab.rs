//! Caller-owned tab state observed and partially mutated by the engine.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Unique identifier for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u64);

impl TabId {
    /// Create a new tab ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tab({})", self.0)
    }
}

/// Lifecycle state of a tab's content. Mutated only by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Content resident and usable.
    Normal,
    /// Content is being loaded for the first time.
    Loading,
    /// Content released; a snapshot is held by the engine.
    Hibernated,
    /// A restore failed; the tab must be re-registered or repaired.
    Error,
}

/// A form field captured for restoration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub element_id: String,
    pub name: String,
    pub value: String,
    pub field_type: String,
}

/// The heavyweight payload of a tab.
///
/// This is what hibernation releases and reactivation restores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabContent {
    /// Serialized DOM tree (simplified representation)
    pub dom: Vec<u8>,
    /// JavaScript heap snapshot (if available)
    pub js_heap: Option<Vec<u8>>,
    /// Form field values (for restoration)
    pub form_data: Vec<FormField>,
}

impl TabContent {
    /// Rough in-memory footprint of this content, in bytes.
    pub fn approx_size(&self) -> usize {
        let forms: usize = self
            .form_data
            .iter()
            .map(|f| f.element_id.len() + f.name.len() + f.value.len() + f.field_type.len())
            .sum();
        self.dom.len() + self.js_heap.as_ref().map_or(0, |h| h.len()) + forms
    }
}

/// Per-tab view state preserved across hibernation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Scroll position (x, y)
    pub scroll: (f32, f32),
    /// Zoom factor
    pub zoom: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scroll: (0.0, 0.0),
            zoom: 1.0,
        }
    }
}

/// A tab as seen by the virtualization engine.
///
/// The caller owns the tab and its identity; the engine only rewrites
/// `content`, `view`, `metadata` and `lifecycle` while a hibernate or
/// reactivate transition is in flight.
#[derive(Debug)]
pub struct Tab {
    /// Stable unique identifier, assigned by the caller.
    pub id: TabId,
    /// Whether the tab is the focused/foreground one.
    pub active: bool,
    /// Whether the user pinned the tab.
    pub pinned: bool,
    /// Whether the tab holds unsaved user input.
    pub unsaved_changes: bool,
    /// When the tab was last activated by the caller or the engine.
    pub last_activated: Instant,
    /// Heavyweight payload; absent while hibernated or before first load.
    pub content: Option<TabContent>,
    /// View state preserved across hibernation.
    pub view: ViewState,
    /// Content lifecycle, owned by the engine.
    pub lifecycle: LifecycleState,
    /// Opaque key/value bag; rewritten by the engine during restore.
    pub metadata: HashMap<String, String>,
}

impl Tab {
    /// Create a tab with no content. Content arrives via [`ContentLoader`]
    /// on first activation, or can be set directly before registering.
    pub fn new(id: TabId) -> Self {
        Self {
            id,
            active: false,
            pinned: false,
            unsaved_changes: false,
            last_activated: Instant::now(),
            content: None,
            view: ViewState::default(),
            lifecycle: LifecycleState::Normal,
            metadata: HashMap::new(),
        }
    }

    /// Create a tab with content already resident.
    pub fn with_content(id: TabId, content: TabContent) -> Self {
        let mut tab = Self::new(id);
        tab.content = Some(content);
        tab
    }

    /// Time since the tab was last activated.
    pub fn idle_time(&self) -> Duration {
        self.last_activated.elapsed()
    }
}

/// How callers and the engine share a tab. The engine drops its clone of
/// the Arc on unregister, so it never outlives the caller's ownership.
pub type SharedTab = Arc<Mutex<Tab>>;

/// Future returned by [`ContentLoader::initialize`].
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<TabContent, EngineError>> + Send>>;

/// Hook for lazily loading a tab's content the first time it is needed.
///
/// This covers initial load only; hibernate/reactivate round-trips go
/// through the engine's snapshot codec and never call the loader.
pub trait ContentLoader: Send + Sync {
    fn initialize(&self, id: TabId) -> LoadFuture;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_size_estimate() {
        let content = TabContent {
            dom: vec![0u8; 1000],
            js_heap: Some(vec![0u8; 500]),
            form_data: vec![FormField {
                element_id: "q".into(),
                name: "q".into(),
                value: "rust".into(),
                field_type: "text".into(),
            }],
        };
        assert_eq!(content.approx_size(), 1000 + 500 + 1 + 1 + 4 + 4);
    }

    #[test]
    fn test_new_tab_has_no_content() {
        let tab = Tab::new(TabId::new(7));
        assert!(tab.content.is_none());
        assert_eq!(tab.lifecycle, LifecycleState::Normal);
        assert_eq!(tab.view, ViewState::default());
    }
}
