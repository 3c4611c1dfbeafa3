pub mod config;
pub mod detections;
pub mod draw;
pub mod error;
pub mod export;
pub mod geometry;
pub mod pipeline;
pub mod registry;
pub mod sink;
pub mod track;
pub mod tracker;
pub mod types;

pub use error::{ExportError, GeometryError, TrackError};
pub use export::{PerTrackExporter, SegmentExporter};
pub use geometry::BoundingBox;
pub use pipeline::{FanOut, FrameConsumer, FrameSnapshot, TrackObservation};
pub use registry::TrackRegistry;
pub use track::{Track, TrackStatus};
pub use tracker::{SingleObjectTracker, TrackerBackend, TrackerFactory};
pub use types::{Config, Frame};
