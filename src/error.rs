use crate::geometry::BoundingBox;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("invalid box {0:?}: width and height must be at least one pixel")]
    InvalidBox(BoundingBox),
}

#[derive(Debug, Clone, Error)]
pub enum TrackError {
    #[error("invalid detection: degenerate box {0}x{1}")]
    InvalidDetection(i32, i32),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Failures in a segment's sinks. Fatal to that segment only; the
/// tracking loop keeps running.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("segment I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame encode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("annotation document serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame buffer does not match declared {0}x{1} dimensions")]
    FrameBuffer(usize, usize),
}
