// src/track.rs
//
// A single tracked object: stable identity, box history, and the
// delegate single-object tracker it exclusively owns. Mutated only by
// the registry, once per frame.

use crate::error::{GeometryError, TrackError};
use crate::geometry::{self, BoundingBox};
use crate::tracker::{SingleObjectTracker, TrackerFactory};
use crate::types::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Active,
    /// Terminal. Set when the delegate tracker signals loss; the
    /// registry removes the track the same frame.
    Failed,
}

pub struct Track {
    pub id: u32,
    box_history: Vec<BoundingBox>,
    tracker: Box<dyn SingleObjectTracker>,
    status: TrackStatus,
    label: Option<String>,
}

impl Track {
    /// Seeds the delegate tracker with `frame` and `initial_box`. A
    /// degenerate initial box is the one creation-time error; it is
    /// scoped to the single detection that caused it.
    pub fn new(
        id: u32,
        factory: &dyn TrackerFactory,
        frame: &Frame,
        initial_box: BoundingBox,
    ) -> Result<Self, TrackError> {
        if initial_box.is_degenerate() {
            return Err(TrackError::InvalidDetection(initial_box.w, initial_box.h));
        }
        let tracker = factory.build(frame, initial_box);
        Ok(Self {
            id,
            box_history: vec![initial_box],
            tracker,
            status: TrackStatus::Active,
            label: None,
        })
    }

    /// Delegates to the tracker. On success the returned box becomes
    /// the current box; on loss the status flips to `Failed` and stays
    /// there.
    pub fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        match self.tracker.update(frame) {
            Some(bbox) => {
                self.box_history.push(bbox);
                Some(bbox)
            }
            None => {
                self.status = TrackStatus::Failed;
                None
            }
        }
    }

    pub fn current_box(&self) -> BoundingBox {
        *self
            .box_history
            .last()
            .expect("box history is seeded at creation")
    }

    pub fn overlaps(&self, bbox: BoundingBox) -> Result<bool, GeometryError> {
        Ok(geometry::overlap_ratio(self.current_box(), bbox)? > 0.0)
    }

    pub fn contains_box(&self, bbox: BoundingBox) -> bool {
        geometry::contains(self.current_box(), bbox)
    }

    pub fn status(&self) -> TrackStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TrackStatus::Active
    }

    pub fn history(&self) -> &[BoundingBox] {
        &self.box_history
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Classifier label from an upstream consumer. Last write wins;
    /// the exporter registers whatever is set at first sight.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerBackend;

    fn frame() -> Frame {
        Frame::new(vec![0; 32 * 32 * 3], 32, 32, 0.0)
    }

    #[test]
    fn degenerate_initial_box_is_rejected() {
        let f = frame();
        let bad = BoundingBox::new(5, 5, 0, 10);
        assert!(Track::new(1, &TrackerBackend::Hold, &f, bad).is_err());
    }

    #[test]
    fn update_appends_history_and_loss_is_terminal() {
        let f = frame();
        let b = BoundingBox::new(2, 2, 8, 8);
        let mut track = Track::new(1, &TrackerBackend::Hold, &f, b).unwrap();
        assert_eq!(track.current_box(), b);

        assert_eq!(track.update(&f), Some(b));
        assert_eq!(track.history().len(), 2);
        assert!(track.is_active());
    }

    #[test]
    fn overlap_and_containment_use_current_box() {
        let f = frame();
        let b = BoundingBox::new(0, 0, 20, 20);
        let track = Track::new(1, &TrackerBackend::Hold, &f, b).unwrap();

        assert!(track.overlaps(BoundingBox::new(10, 10, 20, 20)).unwrap());
        assert!(!track.overlaps(BoundingBox::new(25, 25, 5, 5)).unwrap());
        assert!(track.contains_box(BoundingBox::new(5, 5, 4, 4)));
        assert!(!track.contains_box(BoundingBox::new(0, 5, 4, 4)));
    }
}
