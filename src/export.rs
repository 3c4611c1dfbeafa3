// src/export.rs
//
// Segmented export state machines. A segment instance moves
// Idle -> Recording -> Closed; on close it is committed only if it
// accumulated enough annotated frames, otherwise every artifact it
// wrote is discarded. The session exporter keeps at most one segment
// open; the per-track exporter keeps one per live track id.

use crate::error::ExportError;
use crate::pipeline::snapshot::{FrameSnapshot, TrackObservation};
use crate::pipeline::FrameConsumer;
use crate::sink::{SegmentSink, SinkFactory};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Label used when no upstream classifier named the track.
pub const DEFAULT_LABEL: &str = "object";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub bbox: crate::geometry::BoundingBox,
    pub track_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub annotations: Vec<AnnotationRecord>,
}

/// The single annotation document of a committed segment. Frame
/// records are appended by a sequential state machine, so they are
/// ordered by frame id and unique per frame id by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationDocument {
    pub track_labels: BTreeMap<u32, String>,
    pub frames: Vec<FrameRecord>,
}

/// One recording segment: its sink, its document, and how many
/// annotated frames it has absorbed.
struct OpenSegment {
    name: String,
    sink: Box<dyn SegmentSink>,
    doc: AnnotationDocument,
    frame_count: u64,
}

impl OpenSegment {
    fn new(name: String, sink: Box<dyn SegmentSink>) -> Self {
        Self {
            name,
            sink,
            doc: AnnotationDocument::default(),
            frame_count: 0,
        }
    }

    /// Appends one frame: annotation records for the relevant tracks
    /// (labels registered at first sight), the raw frame, and the
    /// annotated copy.
    fn record(&mut self, snapshot: &FrameSnapshot, only: Option<u32>) -> Result<(), ExportError> {
        let tracks: Vec<TrackObservation> = snapshot
            .tracks
            .iter()
            .filter(|t| only.map_or(true, |id| t.id == id))
            .cloned()
            .collect();

        let mut annotations = Vec::with_capacity(tracks.len());
        for track in &tracks {
            self.doc.track_labels.entry(track.id).or_insert_with(|| {
                track
                    .label
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LABEL.to_string())
            });
            annotations.push(AnnotationRecord {
                bbox: track.bbox,
                track_id: track.id,
            });
        }
        self.doc.frames.push(FrameRecord {
            frame: snapshot.frame_id,
            annotations,
        });

        self.sink.write_frame(snapshot.frame_id, &snapshot.frame)?;
        self.sink
            .write_annotated(snapshot.frame_id, &snapshot.frame, &tracks)?;
        self.frame_count += 1;
        Ok(())
    }

    /// Commit-or-discard. Commit renames into the final location only
    /// after the annotation document is flushed and the sink closed.
    fn close(mut self, min_frames: u64) -> Result<bool, ExportError> {
        if self.frame_count >= min_frames {
            self.sink.write_annotations(&self.doc)?;
            let path = self.sink.commit()?;
            info!(
                "segment '{}' committed: {} frames -> {}",
                self.name,
                self.frame_count,
                path.display()
            );
            Ok(true)
        } else {
            self.sink.discard()?;
            info!(
                "segment '{}' discarded: {} frames below threshold {}",
                self.name, self.frame_count, min_frames
            );
            Ok(false)
        }
    }

    /// Best-effort teardown after a sink failure mid-segment.
    fn abort(self) {
        let name = self.name.clone();
        if let Err(e) = self.sink.discard() {
            warn!("could not discard broken segment '{}': {}", name, e);
        }
    }
}

/// Whole-session scope: one segment spans each contiguous run of
/// frames with a non-empty live-track set.
pub struct SegmentExporter {
    min_frames: u64,
    factory: Box<dyn SinkFactory>,
    next_segment_id: u64,
    current: Option<OpenSegment>,
    committed: u64,
    discarded: u64,
}

impl SegmentExporter {
    pub fn new(min_frames: u64, factory: Box<dyn SinkFactory>) -> Self {
        Self {
            min_frames,
            factory,
            next_segment_id: 1,
            current: None,
            committed: 0,
            discarded: 0,
        }
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn observe(&mut self, snapshot: &FrameSnapshot) -> Result<(), ExportError> {
        if !snapshot.tracks.is_empty() {
            if self.current.is_none() {
                let name = format!("segment_{:04}", self.next_segment_id);
                self.next_segment_id += 1;
                let sink = self.factory.open(&name)?;
                info!("segment '{}' opened at frame {}", name, snapshot.frame_id);
                self.current = Some(OpenSegment::new(name, sink));
            }
            let failed = self
                .current
                .as_mut()
                .and_then(|seg| seg.record(snapshot, None).err());
            if let Some(e) = failed {
                // Fatal to this segment only. The next populated frame
                // starts a fresh one.
                if let Some(seg) = self.current.take() {
                    seg.abort();
                }
                self.discarded += 1;
                return Err(e);
            }
        } else if let Some(seg) = self.current.take() {
            self.settle(seg)?;
        }
        Ok(())
    }

    fn settle(&mut self, seg: OpenSegment) -> Result<(), ExportError> {
        match seg.close(self.min_frames) {
            Ok(true) => self.committed += 1,
            Ok(false) => self.discarded += 1,
            Err(e) => {
                self.discarded += 1;
                return Err(e);
            }
        }
        Ok(())
    }
}

impl FrameConsumer for SegmentExporter {
    fn name(&self) -> &str {
        "session-exporter"
    }

    fn on_frame(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        self.observe(snapshot)?;
        Ok(())
    }

    fn on_finalize(&mut self) -> Result<()> {
        if let Some(seg) = self.current.take() {
            debug!("finalize: forcing segment '{}' closed", seg.name);
            self.settle(seg)?;
        }
        Ok(())
    }
}

/// Per-track scope: each live id records its own independent segment;
/// an id leaving the live set closes only that id's segment.
pub struct PerTrackExporter {
    min_frames: u64,
    factory: Box<dyn SinkFactory>,
    next_segment_id: u64,
    open: BTreeMap<u32, OpenSegment>,
    committed: u64,
    discarded: u64,
}

impl PerTrackExporter {
    pub fn new(min_frames: u64, factory: Box<dyn SinkFactory>) -> Self {
        Self {
            min_frames,
            factory,
            next_segment_id: 1,
            open: BTreeMap::new(),
            committed: 0,
            discarded: 0,
        }
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn settle(&mut self, seg: OpenSegment) -> Option<ExportError> {
        match seg.close(self.min_frames) {
            Ok(true) => {
                self.committed += 1;
                None
            }
            Ok(false) => {
                self.discarded += 1;
                None
            }
            Err(e) => {
                self.discarded += 1;
                Some(e)
            }
        }
    }

    fn observe(&mut self, snapshot: &FrameSnapshot) -> Result<(), ExportError> {
        let mut first_error: Option<ExportError> = None;

        // Ids that ceased being trackable close now; the rest continue
        // untouched.
        let gone: Vec<u32> = self
            .open
            .keys()
            .copied()
            .filter(|id| snapshot.track(*id).is_none())
            .collect();
        for id in gone {
            if let Some(seg) = self.open.remove(&id) {
                if let Some(e) = self.settle(seg) {
                    warn!("closing track {} segment failed: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        for track in &snapshot.tracks {
            if !self.open.contains_key(&track.id) {
                let name = format!("track{:03}_segment_{:04}", track.id, self.next_segment_id);
                match self.factory.open(&name) {
                    Ok(sink) => {
                        info!(
                            "segment '{}' opened for track {} at frame {}",
                            name, track.id, snapshot.frame_id
                        );
                        self.next_segment_id += 1;
                        self.open.insert(track.id, OpenSegment::new(name, sink));
                    }
                    Err(e) => {
                        warn!("could not open segment for track {}: {}", track.id, e);
                        first_error.get_or_insert(e);
                        continue;
                    }
                }
            }

            let failed = self
                .open
                .get_mut(&track.id)
                .and_then(|seg| seg.record(snapshot, Some(track.id)).err());
            if let Some(e) = failed {
                if let Some(seg) = self.open.remove(&track.id) {
                    seg.abort();
                }
                self.discarded += 1;
                warn!("track {} segment failed and was dropped: {}", track.id, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl FrameConsumer for PerTrackExporter {
    fn name(&self) -> &str {
        "per-track-exporter"
    }

    fn on_frame(&mut self, snapshot: &FrameSnapshot) -> Result<()> {
        self.observe(snapshot)?;
        Ok(())
    }

    fn on_finalize(&mut self) -> Result<()> {
        let mut first_error: Option<ExportError> = None;
        while let Some((id, seg)) = self.open.pop_first() {
            debug!("finalize: forcing track {} segment closed", id);
            if let Some(e) = self.settle(seg) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
