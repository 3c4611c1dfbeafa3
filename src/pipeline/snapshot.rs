// src/pipeline/snapshot.rs
//
// Immutable per-frame view of the live track set, handed to every
// fan-out consumer. Consumers never touch registry state.

use crate::geometry::BoundingBox;
use crate::types::Frame;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TrackObservation {
    pub id: u32,
    pub bbox: BoundingBox,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    pub frame: Arc<Frame>,
    /// Live tracks after this frame's retirement and creation phases.
    pub tracks: Vec<TrackObservation>,
    pub total_started: u64,
    pub total_finished: u64,
}

impl FrameSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, id: u32) -> Option<&TrackObservation> {
        self.tracks.iter().find(|t| t.id == id)
    }
}
