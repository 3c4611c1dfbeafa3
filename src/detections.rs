// src/detections.rs
//
// Read side of the detector collaborator: detections arrive as a
// JSONL sidecar next to the frame sequence, one record per line.

use crate::geometry::BoundingBox;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub frame: u64,
    pub boxes: Vec<BoundingBox>,
}

/// Loads `detections.jsonl` into a frame-id -> boxes map. Frames
/// without a record simply have no detections.
pub fn load_detections(path: &Path) -> Result<HashMap<u64, Vec<BoundingBox>>> {
    let file =
        File::open(path).with_context(|| format!("opening detections {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut by_frame: HashMap<u64, Vec<BoundingBox>> = HashMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DetectionRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", path.display(), lineno + 1))?;
        by_frame.entry(record.frame).or_default().extend(record.boxes);
    }
    Ok(by_frame)
}
