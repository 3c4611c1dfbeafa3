// src/tracker.rs
//
// Collaborator boundary for the single-object tracking capability.
// The registry never depends on a concrete algorithm; each live track
// owns an opaque delegate built once from the frame and initial box.

use crate::geometry::BoundingBox;
use crate::types::Frame;
use serde::{Deserialize, Serialize};

/// A per-track delegate, called once per frame. `None` signals loss:
/// a first-class outcome that retires the track, never an error.
pub trait SingleObjectTracker: Send {
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox>;
}

/// Builds the delegate for a freshly created track.
pub trait TrackerFactory: Send {
    fn build(&self, frame: &Frame, initial: BoundingBox) -> Box<dyn SingleObjectTracker>;
}

/// Closed set of built-in backends, picked once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerBackend {
    /// Re-reports the box it was seeded with. Suitable for
    /// stationary-camera pipelines where association against fresh
    /// detections does the real work.
    Hold,
    /// Extrapolates from the last two boxes and reports loss once the
    /// box leaves the frame entirely.
    ConstantVelocity,
}

impl TrackerFactory for TrackerBackend {
    fn build(&self, _frame: &Frame, initial: BoundingBox) -> Box<dyn SingleObjectTracker> {
        match self {
            TrackerBackend::Hold => Box::new(HoldTracker { current: initial }),
            TrackerBackend::ConstantVelocity => Box::new(ConstantVelocityTracker {
                prev: initial,
                current: initial,
            }),
        }
    }
}

struct HoldTracker {
    current: BoundingBox,
}

impl SingleObjectTracker for HoldTracker {
    fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
        Some(self.current)
    }
}

struct ConstantVelocityTracker {
    prev: BoundingBox,
    current: BoundingBox,
}

impl SingleObjectTracker for ConstantVelocityTracker {
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox> {
        let dx = self.current.x - self.prev.x;
        let dy = self.current.y - self.prev.y;
        let next = BoundingBox::new(
            self.current.x + dx,
            self.current.y + dy,
            self.current.w,
            self.current.h,
        );

        let off_screen = next.x2() < 0
            || next.y2() < 0
            || next.x >= frame.width as i32
            || next.y >= frame.height as i32;
        if off_screen {
            return None;
        }

        self.prev = self.current;
        self.current = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(vec![0; 64 * 48 * 3], 64, 48, 0.0)
    }

    #[test]
    fn hold_tracker_repeats_its_box() {
        let f = frame();
        let b = BoundingBox::new(10, 10, 20, 20);
        let mut t = TrackerBackend::Hold.build(&f, b);
        assert_eq!(t.update(&f), Some(b));
        assert_eq!(t.update(&f), Some(b));
    }

    #[test]
    fn constant_velocity_reports_loss_off_screen() {
        let f = frame();
        let mut t = ConstantVelocityTracker {
            prev: BoundingBox::new(40, 10, 10, 10),
            current: BoundingBox::new(55, 10, 10, 10),
        };
        // Moving right at 15 px/frame: 70, 85 (partially visible at 70,
        // x=70 >= 64 means fully past the right edge).
        assert!(t.update(&f).is_none());
    }

    #[test]
    fn constant_velocity_extrapolates() {
        let f = frame();
        let mut t = ConstantVelocityTracker {
            prev: BoundingBox::new(10, 10, 10, 10),
            current: BoundingBox::new(14, 12, 10, 10),
        };
        assert_eq!(t.update(&f), Some(BoundingBox::new(18, 14, 10, 10)));
        assert_eq!(t.update(&f), Some(BoundingBox::new(22, 16, 10, 10)));
    }
}
