//! In-memory hibernation snapshots.
//!
//! A snapshot is the tab's captured state, serialized with serde_json
//! and zstd-compressed. Snapshots never touch disk; they live inside
//! the owning virtualization record until restored or discarded.

use crate::error::EngineError;
use crate::tab::{TabContent, ViewState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Compression level for Zstd (1-22, higher = better compression, slower)
const COMPRESSION_LEVEL: i32 = 3; // Fast compression for quick hibernation

/// Everything a restore needs to bring back a tab byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CapturedState {
    pub content: TabContent,
    pub view: ViewState,
    pub metadata: HashMap<String, String>,
}

/// A hibernated tab's frozen state.
///
/// Created exactly once by capture, consumed exactly once by restore.
#[derive(Debug, Clone)]
pub struct HibernationSnapshot {
    compressed: Vec<u8>,
    /// When the snapshot was taken.
    pub hibernated_at: Instant,
    /// Uncompressed footprint of the captured content, in bytes. This
    /// is what hibernation freed and what restore brings back.
    pub size_estimate: usize,
}

impl HibernationSnapshot {
    /// Size of the compressed payload held in memory.
    pub fn compressed_len(&self) -> usize {
        self.compressed.len()
    }

    #[cfg(test)]
    pub(crate) fn corrupt(size_estimate: usize) -> Self {
        Self {
            compressed: vec![0xde, 0xad, 0xbe, 0xef],
            hibernated_at: Instant::now(),
            size_estimate,
        }
    }
}

/// Serialize and compress a tab's captured state.
pub(crate) fn capture(state: &CapturedState) -> Result<HibernationSnapshot, EngineError> {
    let size_estimate = state.content.approx_size();
    let serialized = serde_json::to_vec(state).map_err(|e| EngineError::Codec(e.to_string()))?;
    let compressed = zstd::encode_all(&serialized[..], COMPRESSION_LEVEL)
        .map_err(|e| EngineError::Codec(e.to_string()))?;

    debug!(
        uncompressed = serialized.len(),
        compressed = compressed.len(),
        "captured hibernation snapshot"
    );

    Ok(HibernationSnapshot {
        compressed,
        hibernated_at: Instant::now(),
        size_estimate,
    })
}

/// Decompress and deserialize a snapshot back into captured state.
pub(crate) fn restore(snapshot: &HibernationSnapshot) -> Result<CapturedState, EngineError> {
    let serialized =
        zstd::decode_all(&snapshot.compressed[..]).map_err(|e| EngineError::Codec(e.to_string()))?;
    serde_json::from_slice(&serialized).map_err(|e| EngineError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::FormField;

    fn sample_state() -> CapturedState {
        CapturedState {
            content: TabContent {
                dom: vec![1, 2, 3, 4, 5],
                js_heap: Some(vec![6, 7, 8]),
                form_data: vec![FormField {
                    element_id: "email".into(),
                    name: "email".into(),
                    value: "test@example.com".into(),
                    field_type: "email".into(),
                }],
            },
            view: ViewState {
                scroll: (0.0, 150.5),
                zoom: 1.25,
            },
            metadata: HashMap::from([("url".into(), "https://example.com".into())]),
        }
    }

    #[test]
    fn test_capture_restore_round_trip() {
        let state = sample_state();
        let snapshot = capture(&state).unwrap();
        assert_eq!(snapshot.size_estimate, state.content.approx_size());

        let restored = restore(&snapshot).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_repetitive_content_compresses() {
        let mut state = sample_state();
        state.content.dom = vec![0u8; 100_000];
        let snapshot = capture(&state).unwrap();
        assert!(snapshot.compressed_len() < 50_000, "compression ratio too low");
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let snapshot = HibernationSnapshot::corrupt(64);
        assert!(restore(&snapshot).is_err());
    }
}
