//! Engine error types.

use crate::tab::TabId;
use thiserror::Error;

/// Errors produced by the virtualization engine.
///
/// Capture and restore failures are contained: they surface through
/// events and logs, never through `activate` or `optimize_visibility`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tab not registered: {0}")]
    TabNotFound(TabId),

    #[error("tab {0} is not eligible for hibernation")]
    NotEligible(TabId),

    #[error("tab {0} is not hibernated")]
    NotHibernated(TabId),

    #[error("snapshot capture failed for {id}: {reason}")]
    CaptureFailed { id: TabId, reason: String },

    #[error("snapshot restore failed for {id}: {reason}")]
    RestoreFailed { id: TabId, reason: String },

    #[error("snapshot codec error: {0}")]
    Codec(String),

    #[error("content load failed for {id}: {reason}")]
    LoadFailed { id: TabId, reason: String },
}
