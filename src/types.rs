use crate::tracker::TrackerBackend;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub export: ExportConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Hard cap on concurrently live tracks. Detections beyond the cap
    /// are dropped for the frame, not queued.
    pub max_active_tracks: usize,
    /// Minimum IoU for a detection to be absorbed by an existing track.
    pub match_overlap_threshold: f64,
    /// Single-object tracker backing each live track.
    pub backend: TrackerBackend,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_active_tracks: 10,
            match_overlap_threshold: 0.2,
            backend: TrackerBackend::Hold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
    /// Segments shorter than this many annotated frames are discarded
    /// entirely at close instead of committed.
    pub min_frames_threshold: u64,
    /// One segment for the whole session.
    pub session_segments: bool,
    /// Additionally one independent segment per tracked id.
    pub per_track_segments: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            min_frames_threshold: 25,
            session_segments: true,
            per_track_segments: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_dir: String,
    pub fps: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "input".to_string(),
            fps: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One decoded video frame, tightly packed RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize, timestamp_ms: f64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
        }
    }
}
