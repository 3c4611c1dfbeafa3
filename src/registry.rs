// src/registry.rs
//
// Track lifecycle manager. Owns the live track set and advances it
// once per frame: update every track, associate surviving tracks with
// fresh detections, retire failures, then create tracks for the
// leftover detections under the capacity cap.
//
// Association is greedy and first-match-wins. The matched set is
// iteration-order independent; which detection a track consumes when
// several tie is not, and callers must treat that as arbitrary.

use crate::error::GeometryError;
use crate::geometry::{self, BoundingBox};
use crate::pipeline::snapshot::{FrameSnapshot, TrackObservation};
use crate::track::Track;
use crate::tracker::TrackerFactory;
use crate::types::{Frame, TrackingConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct TrackRegistry {
    config: TrackingConfig,
    factory: Box<dyn TrackerFactory>,
    live: Vec<Track>,
    next_id: u32,
    total_started: u64,
    total_finished: u64,
    frames_processed: u64,
    detections_seen: u64,
    detections_dropped: u64,
}

/// Lifetime counters for the end-of-session report.
#[derive(Debug, Clone, Copy)]
pub struct RegistryStats {
    pub frames_processed: u64,
    pub live_tracks: usize,
    pub total_started: u64,
    pub total_finished: u64,
    pub detections_seen: u64,
    /// Detections that neither matched a track nor created one:
    /// degenerate, over capacity, or blocked by a live track.
    pub detections_dropped: u64,
}

impl TrackRegistry {
    pub fn new(config: TrackingConfig) -> Self {
        let factory = Box::new(config.backend);
        Self::with_factory(config, factory)
    }

    /// Registry with an externally supplied tracker factory. The
    /// built-in backends cover the common cases; tests and embedders
    /// inject their own capability here.
    pub fn with_factory(config: TrackingConfig, factory: Box<dyn TrackerFactory>) -> Self {
        Self {
            config,
            factory,
            live: Vec::with_capacity(16),
            next_id: 1,
            total_started: 0,
            total_finished: 0,
            frames_processed: 0,
            detections_seen: 0,
            detections_dropped: 0,
        }
    }

    /// Advances every live track by one frame and folds in the frame's
    /// detections. Returns the post-frame snapshot for fan-out.
    ///
    /// Only malformed geometry escalates out of here; a lost track or
    /// a dropped detection never does.
    pub fn process_frame(
        &mut self,
        frame: Arc<Frame>,
        detections: &[BoundingBox],
    ) -> Result<FrameSnapshot, GeometryError> {
        self.frames_processed += 1;
        self.detections_seen += detections.len() as u64;

        // Degenerate detections are a per-detection condition, not a
        // frame failure. Drop them before any geometry runs.
        let mut pool: Vec<BoundingBox> = Vec::with_capacity(detections.len());
        for det in detections {
            if det.is_degenerate() {
                warn!(
                    "frame {}: dropping degenerate detection {:?}",
                    self.frames_processed, det
                );
                self.detections_dropped += 1;
            } else {
                pool.push(*det);
            }
        }

        // Update phase. Every live track is visited before any removal
        // so association sees the full post-update picture.
        for track in &mut self.live {
            if track.update(&frame).is_none() {
                info!(
                    "track {} lost by its tracker at frame {}",
                    track.id, self.frames_processed
                );
            }
        }

        // Association phase: each surviving track absorbs every pooled
        // detection it sufficiently overlaps. A detection matches at
        // most one track; a track may absorb several detections.
        for track in self.live.iter().filter(|t| t.is_active()) {
            let current = track.current_box();
            let mut i = 0;
            while i < pool.len() {
                if geometry::overlap_ratio(current, pool[i])? > self.config.match_overlap_threshold
                {
                    pool.remove(i);
                } else {
                    i += 1;
                }
            }
        }

        // Retirement before creation, so the cap below reflects only
        // surviving tracks.
        let before = self.live.len();
        self.live.retain(|t| t.is_active());
        let retired = (before - self.live.len()) as u64;
        self.total_finished += retired;
        if retired > 0 {
            debug!(
                "frame {}: retired {} track(s), {} live",
                self.frames_processed,
                retired,
                self.live.len()
            );
        }

        // Creation phase for the leftover detections, in input order.
        for det in pool {
            if self.live.len() >= self.config.max_active_tracks {
                debug!(
                    "frame {}: at capacity ({}), dropping detection {:?}",
                    self.frames_processed, self.config.max_active_tracks, det
                );
                self.detections_dropped += 1;
                continue;
            }
            if self.blocked_by_live_track(det)? {
                self.detections_dropped += 1;
                continue;
            }

            match Track::new(self.next_id, self.factory.as_ref(), &frame, det) {
                Ok(track) => {
                    info!(
                        "track {} created at frame {} from {:?}",
                        track.id, self.frames_processed, det
                    );
                    self.live.push(track);
                    self.next_id += 1;
                    self.total_started += 1;
                }
                Err(e) => {
                    warn!("frame {}: detection dropped: {}", self.frames_processed, e);
                    self.detections_dropped += 1;
                }
            }
        }

        debug_assert_eq!(
            self.live.len() as u64,
            self.total_started - self.total_finished
        );

        Ok(self.snapshot(frame))
    }

    /// Containment is checked first as a cheap short-circuit; the
    /// policy is simply zero overlap with every live track.
    fn blocked_by_live_track(&self, det: BoundingBox) -> Result<bool, GeometryError> {
        for track in &self.live {
            if track.contains_box(det) || track.overlaps(det)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn snapshot(&self, frame: Arc<Frame>) -> FrameSnapshot {
        let tracks = self
            .live
            .iter()
            .map(|t| TrackObservation {
                id: t.id,
                bbox: t.current_box(),
                label: t.label().map(str::to_string),
            })
            .collect();
        FrameSnapshot {
            frame_id: self.frames_processed,
            timestamp_ms: frame.timestamp_ms,
            frame,
            tracks,
            total_started: self.total_started,
            total_finished: self.total_finished,
        }
    }

    /// Attaches an upstream classifier's label to a live track.
    pub fn set_label(&mut self, id: u32, label: impl Into<String>) -> bool {
        match self.live.iter_mut().find(|t| t.id == id) {
            Some(track) => {
                track.set_label(label);
                true
            }
            None => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn total_started(&self) -> u64 {
        self.total_started
    }

    pub fn total_finished(&self) -> u64 {
        self.total_finished
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            frames_processed: self.frames_processed,
            live_tracks: self.live.len(),
            total_started: self.total_started,
            total_finished: self.total_finished,
            detections_seen: self.detections_seen,
            detections_dropped: self.detections_dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{SingleObjectTracker, TrackerBackend};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn frame() -> Arc<Frame> {
        Arc::new(Frame::new(vec![0; 200 * 200 * 3], 200, 200, 0.0))
    }

    fn bx(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h)
    }

    fn registry() -> TrackRegistry {
        TrackRegistry::new(TrackingConfig::default())
    }

    /// Tracker that holds its box for `lifetime` updates, then fails.
    struct FailAfter {
        bbox: BoundingBox,
        remaining: u32,
    }

    impl SingleObjectTracker for FailAfter {
        fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(self.bbox)
        }
    }

    struct FailAfterFactory {
        lifetime: u32,
    }

    impl TrackerFactory for FailAfterFactory {
        fn build(&self, _frame: &Frame, initial: BoundingBox) -> Box<dyn SingleObjectTracker> {
            Box::new(FailAfter {
                bbox: initial,
                remaining: self.lifetime,
            })
        }
    }

    /// Counts how many delegate updates ran, regardless of track fate.
    struct CountingFactory {
        updates: Arc<AtomicU32>,
    }

    struct CountingTracker {
        bbox: BoundingBox,
        updates: Arc<AtomicU32>,
    }

    impl SingleObjectTracker for CountingTracker {
        fn update(&mut self, _frame: &Frame) -> Option<BoundingBox> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Some(self.bbox)
        }
    }

    impl TrackerFactory for CountingFactory {
        fn build(&self, _frame: &Frame, initial: BoundingBox) -> Box<dyn SingleObjectTracker> {
            Box::new(CountingTracker {
                bbox: initial,
                updates: self.updates.clone(),
            })
        }
    }

    #[test]
    fn empty_stream_starts_nothing() {
        // Scenario: N frames of empty detections, zero live tracks.
        let mut reg = registry();
        for _ in 0..10 {
            let snap = reg.process_frame(frame(), &[]).unwrap();
            assert!(snap.is_empty());
        }
        assert_eq!(reg.total_started(), 0);
        assert_eq!(reg.total_finished(), 0);
    }

    #[test]
    fn single_detection_creates_one_persistent_track() {
        // Scenario: one detection on frame 1, tracker always succeeds,
        // no further detections.
        let mut reg = registry();
        let snap = reg.process_frame(frame(), &[bx(10, 10, 20, 20)]).unwrap();
        assert_eq!(snap.tracks.len(), 1);
        assert_eq!(snap.tracks[0].id, 1);

        for _ in 0..20 {
            let snap = reg.process_frame(frame(), &[]).unwrap();
            assert_eq!(snap.tracks.len(), 1);
            assert_eq!(snap.tracks[0].id, 1);
        }
        assert_eq!(reg.total_started(), 1);
        assert_eq!(reg.total_finished(), 0);
    }

    #[test]
    fn loss_retires_exactly_when_the_tracker_fails() {
        // Creation succeeds on frame 1; the delegate then survives
        // three updates (frames 2-4) and fails on frame 5.
        let mut reg = TrackRegistry::with_factory(
            TrackingConfig::default(),
            Box::new(FailAfterFactory { lifetime: 3 }),
        );
        reg.process_frame(frame(), &[bx(10, 10, 20, 20)]).unwrap();

        for f in 2..=4 {
            let snap = reg.process_frame(frame(), &[]).unwrap();
            assert_eq!(snap.tracks.len(), 1, "track alive through frame {}", f);
            assert_eq!(reg.total_finished(), 0);
        }

        let snap = reg.process_frame(frame(), &[]).unwrap();
        assert!(snap.is_empty());
        assert_eq!(reg.total_finished(), 1);
    }

    #[test]
    fn retired_ids_are_never_reused() {
        let mut reg = TrackRegistry::with_factory(
            TrackingConfig::default(),
            Box::new(FailAfterFactory { lifetime: 1 }),
        );
        reg.process_frame(frame(), &[bx(10, 10, 20, 20)]).unwrap();
        reg.process_frame(frame(), &[]).unwrap(); // survives
        reg.process_frame(frame(), &[]).unwrap(); // fails, retired

        // Same spot again: a new identity, never id 1.
        let snap = reg.process_frame(frame(), &[bx(10, 10, 20, 20)]).unwrap();
        assert_eq!(snap.tracks[0].id, 2);
        assert_eq!(reg.total_started(), 2);
        assert_eq!(reg.total_finished(), 1);
    }

    #[test]
    fn live_count_invariant_holds_every_frame() {
        let mut reg = TrackRegistry::with_factory(
            TrackingConfig::default(),
            Box::new(FailAfterFactory { lifetime: 2 }),
        );
        let spots = [bx(0, 0, 10, 10), bx(50, 50, 10, 10), bx(120, 120, 10, 10)];
        for f in 0..15 {
            let dets = if f % 3 == 0 { &spots[..] } else { &[][..] };
            reg.process_frame(frame(), dets).unwrap();
            assert_eq!(
                reg.live_count() as u64,
                reg.total_started() - reg.total_finished()
            );
        }
    }

    #[test]
    fn capacity_cap_holds_for_any_input() {
        let config = TrackingConfig {
            max_active_tracks: 3,
            ..TrackingConfig::default()
        };
        let mut reg = TrackRegistry::new(config);

        // Eight disjoint detections; only three tracks may exist.
        let dets: Vec<BoundingBox> = (0..8).map(|i| bx(i * 24, 0, 10, 10)).collect();
        let snap = reg.process_frame(frame(), &dets).unwrap();
        assert_eq!(snap.tracks.len(), 3);
        assert_eq!(reg.total_started(), 3);

        // Overflow was dropped, not queued: nothing new on an empty frame.
        let snap = reg.process_frame(frame(), &[]).unwrap();
        assert_eq!(snap.tracks.len(), 3);
        assert_eq!(reg.total_started(), 3);
        assert_eq!(reg.stats().detections_dropped, 5);
    }

    #[test]
    fn contained_detection_never_spawns_a_track() {
        let mut reg = registry();
        reg.process_frame(frame(), &[bx(0, 0, 100, 100)]).unwrap();

        // Fully inside the existing track's current box.
        let snap = reg.process_frame(frame(), &[bx(12, 12, 5, 5)]).unwrap();
        assert_eq!(snap.tracks.len(), 1);
        assert_eq!(reg.total_started(), 1);
        // The blocked detection counts toward the drop total.
        assert_eq!(reg.stats().detections_dropped, 1);
    }

    #[test]
    fn overlapping_detection_is_absorbed_not_spawned() {
        let mut reg = registry();
        reg.process_frame(frame(), &[bx(10, 10, 40, 40)]).unwrap();

        // Heavy overlap with the live track: consumed by association.
        let snap = reg.process_frame(frame(), &[bx(15, 15, 40, 40)]).unwrap();
        assert_eq!(snap.tracks.len(), 1);

        // Marginal overlap (below the 0.2 threshold) survives the pool
        // but is still blocked at creation by the nonzero-overlap rule.
        let snap = reg.process_frame(frame(), &[bx(45, 45, 40, 40)]).unwrap();
        assert_eq!(snap.tracks.len(), 1);
        assert_eq!(reg.total_started(), 1);
    }

    #[test]
    fn degenerate_detection_is_dropped_others_survive() {
        let mut reg = registry();
        let snap = reg
            .process_frame(frame(), &[bx(5, 5, 0, 0), bx(50, 50, 10, 10)])
            .unwrap();
        assert_eq!(snap.tracks.len(), 1);
        assert_eq!(snap.tracks[0].bbox, bx(50, 50, 10, 10));
        assert_eq!(reg.stats().detections_dropped, 1);
    }

    #[test]
    fn every_live_track_is_updated_each_frame() {
        let updates = Arc::new(AtomicU32::new(0));
        let mut reg = TrackRegistry::with_factory(
            TrackingConfig::default(),
            Box::new(CountingFactory {
                updates: updates.clone(),
            }),
        );
        reg.process_frame(frame(), &[bx(0, 0, 10, 10), bx(100, 100, 10, 10)])
            .unwrap();
        assert_eq!(updates.load(Ordering::SeqCst), 0); // created post-update

        reg.process_frame(frame(), &[]).unwrap();
        assert_eq!(updates.load(Ordering::SeqCst), 2);
        reg.process_frame(frame(), &[]).unwrap();
        assert_eq!(updates.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn labels_flow_into_snapshots() {
        let mut reg = registry();
        reg.process_frame(frame(), &[bx(10, 10, 20, 20)]).unwrap();
        assert!(reg.set_label(1, "person"));
        assert!(!reg.set_label(99, "ghost"));

        let snap = reg.process_frame(frame(), &[]).unwrap();
        assert_eq!(snap.tracks[0].label.as_deref(), Some("person"));
    }

    #[test]
    fn default_backend_tracks_with_hold() {
        // TrackerBackend::Hold through the public constructor.
        let mut reg = TrackRegistry::new(TrackingConfig {
            backend: TrackerBackend::Hold,
            ..TrackingConfig::default()
        });
        reg.process_frame(frame(), &[bx(10, 10, 20, 20)]).unwrap();
        let snap = reg.process_frame(frame(), &[]).unwrap();
        assert_eq!(snap.tracks[0].bbox, bx(10, 10, 20, 20));
    }
}
