// src/sink.rs
//
// Frame/annotation sinks behind the exporter. A sink accumulates one
// segment's artifacts in a staging location; nothing is observable
// under the final name until commit, and discard removes every trace.

use crate::draw::{annotate_frame, frame_to_image};
use crate::error::ExportError;
use crate::export::AnnotationDocument;
use crate::pipeline::snapshot::TrackObservation;
use crate::types::Frame;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait SegmentSink: Send {
    fn write_frame(&mut self, frame_id: u64, frame: &Frame) -> Result<(), ExportError>;

    fn write_annotated(
        &mut self,
        frame_id: u64,
        frame: &Frame,
        tracks: &[TrackObservation],
    ) -> Result<(), ExportError>;

    fn write_annotations(&mut self, doc: &AnnotationDocument) -> Result<(), ExportError>;

    /// Makes the segment visible under its final name. Consumes the
    /// sink: a writer is never shared across segment instances.
    fn commit(self: Box<Self>) -> Result<PathBuf, ExportError>;

    /// Deletes everything written so far.
    fn discard(self: Box<Self>) -> Result<(), ExportError>;
}

/// Opens filesystem sinks for new segments under one output directory.
pub trait SinkFactory: Send {
    fn open(&mut self, segment_name: &str) -> Result<Box<dyn SegmentSink>, ExportError>;
}

/// Directory-per-segment layout:
///
/// ```text
/// <output>/segment_0001/
///     frames/frame_000042.jpg
///     annotated/frame_000042.jpg
///     annotations.json
/// ```
///
/// Everything is written under `<output>/.staging/<name>` and renamed
/// into place on commit.
pub struct FsSegmentSink {
    staging: PathBuf,
    final_path: PathBuf,
}

impl FsSegmentSink {
    pub fn create(output_dir: &Path, name: &str) -> Result<Self, ExportError> {
        let staging = output_dir.join(".staging").join(name);
        let final_path = output_dir.join(name);
        fs::create_dir_all(staging.join("frames"))?;
        fs::create_dir_all(staging.join("annotated"))?;
        debug!("segment '{}' staged at {}", name, staging.display());
        Ok(Self {
            staging,
            final_path,
        })
    }
}

impl SegmentSink for FsSegmentSink {
    fn write_frame(&mut self, frame_id: u64, frame: &Frame) -> Result<(), ExportError> {
        let img = frame_to_image(frame)?;
        let path = self
            .staging
            .join("frames")
            .join(format!("frame_{:06}.jpg", frame_id));
        img.save(path)?;
        Ok(())
    }

    fn write_annotated(
        &mut self,
        frame_id: u64,
        frame: &Frame,
        tracks: &[TrackObservation],
    ) -> Result<(), ExportError> {
        let img = annotate_frame(frame, tracks)?;
        let path = self
            .staging
            .join("annotated")
            .join(format!("frame_{:06}.jpg", frame_id));
        img.save(path)?;
        Ok(())
    }

    fn write_annotations(&mut self, doc: &AnnotationDocument) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(self.staging.join("annotations.json"), json)?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<PathBuf, ExportError> {
        // Rename only after every writer is done, so a partial segment
        // is never visible under the final name.
        if let Err(e) = fs::rename(&self.staging, &self.final_path) {
            // A segment that failed to commit must not pile up under
            // .staging; removal is best-effort, the rename error wins.
            if let Err(rm) = fs::remove_dir_all(&self.staging) {
                debug!(
                    "could not clean up staging {}: {}",
                    self.staging.display(),
                    rm
                );
            }
            return Err(e.into());
        }
        Ok(self.final_path)
    }

    fn discard(self: Box<Self>) -> Result<(), ExportError> {
        fs::remove_dir_all(&self.staging)?;
        Ok(())
    }
}

pub struct FsSinkFactory {
    output_dir: PathBuf,
}

impl FsSinkFactory {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl SinkFactory for FsSinkFactory {
    fn open(&mut self, segment_name: &str) -> Result<Box<dyn SegmentSink>, ExportError> {
        Ok(Box::new(FsSegmentSink::create(
            &self.output_dir,
            segment_name,
        )?))
    }
}
