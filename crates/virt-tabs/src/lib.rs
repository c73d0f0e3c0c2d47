//! Adaptive tab virtualization.
//!
//! Keeps a large tab population responsive under a bounded visible
//! working set:
//! - Priority-driven demotion and promotion of visible tabs
//! - Asynchronous hibernate/reactivate with in-memory zstd snapshots
//! - Periodic sweeps that hibernate idle hidden tabs in small batches
//! - Backpressure handlers for memory-pressure and GC-frequency signals
//!
//! The engine observes caller-owned [`Tab`]s through shared handles and
//! keeps its own per-tab [`VirtualRecord`]; it never retains a tab past
//! [`VirtEngine::unregister`].

mod config;
mod engine;
mod error;
mod events;
mod pressure;
mod priority;
mod queue;
mod record;
mod registry;
mod snapshot;
mod sweeper;
mod tab;

pub use config::VirtConfig;
pub use engine::VirtEngine;
pub use error::EngineError;
pub use events::{VirtEvent, VirtStats};
pub use pressure::{MemoryPressureLevel, PressureConfig, PressureError, PressureMonitor};
pub use priority::{classify, Priority, TabSignals};
pub use record::VirtualRecord;
pub use snapshot::HibernationSnapshot;
pub use sweeper::SweeperHandle;
pub use tab::{
    ContentLoader, FormField, LifecycleState, LoadFuture, SharedTab, Tab, TabContent, TabId,
    ViewState,
};
