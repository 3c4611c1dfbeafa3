// src/pipeline/mod.rs

pub mod fanout;
pub mod snapshot;

pub use fanout::{FanOut, FrameConsumer};
pub use snapshot::{FrameSnapshot, TrackObservation};
