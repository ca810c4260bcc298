//! IoU tracker with EMA smoothing and enter/exit hysteresis.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::tracker::config::{AssignmentStrategy, TrackerConfig};
use crate::tracker::matching::{self, AssignmentResult, CandidateBox};
use crate::tracker::rect::Rect;
use crate::tracker::track::{Track, TrackId};

pub struct SmoothTracker {
    tracks: Vec<Track>,
    frame_id: u64,
    next_id: u64,
    config: TrackerConfig,
}

impl Default for SmoothTracker {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            frame_id: 0,
            next_id: 1,
            config: TrackerConfig::default(),
        }
    }
}

impl SmoothTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Replace the configuration. The old one is kept if `config` is invalid.
    pub fn set_config(&mut self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Change only the emission threshold (and with it the eviction floor).
    pub fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        let config = self.config.clone().with_confidence_threshold(threshold);
        self.set_config(config)
    }

    /// All live tracks, reported or not, in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Number of frames stepped so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_id
    }

    /// Drop every track and restart identifiers.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.frame_id = 0;
        self.next_id = 1;
    }

    /// Advance one frame and return the tracks that pass the hysteresis.
    ///
    /// Detections are validated before any state changes; on error the
    /// tracker is left exactly as it was.
    pub fn step(&mut self, detections: &[CandidateBox]) -> Result<Vec<Track>> {
        let detections = sanitize(detections)?;
        self.frame_id += 1;

        // Step 1: Age every existing track
        let existing = self.tracks.len();
        for track in &mut self.tracks {
            track.mark_missed();
        }

        // Step 2: Associate detections with tracks
        let births = match self.config.assignment {
            AssignmentStrategy::Greedy => self.associate_greedy(&detections, existing),
            AssignmentStrategy::Optimal => self.associate_optimal(&detections, existing),
        };
        for det in births {
            let id = self.allocate_id();
            trace!(track = %id, score = det.score, "new track");
            self.tracks.push(Track::new(id, &det));
        }

        // Step 3: Decay unmatched tracks, evict expired ones
        let config = &self.config;
        let before = self.tracks.len();
        self.tracks.retain_mut(|track| {
            if track.is_expired(config) {
                trace!(
                    track = %track.id,
                    missed = track.missed_count,
                    score = track.score,
                    "evicted"
                );
                return false;
            }
            if track.missed_count > 0 {
                track.decay(config.unmatched_decay);
            }
            true
        });

        // Step 4: Emit tracks past the hysteresis
        let output: Vec<Track> = self
            .tracks
            .iter()
            .filter(|t| t.is_reportable(config))
            .cloned()
            .collect();

        debug!(
            frame = self.frame_id,
            detections = detections.len(),
            live = self.tracks.len(),
            evicted = before - self.tracks.len(),
            reported = output.len(),
            "tracker step"
        );

        Ok(output)
    }

    /// Match each detection in order against the tracks alive at frame start.
    ///
    /// Returns the detections that matched nothing.
    fn associate_greedy(
        &mut self,
        detections: &[CandidateBox],
        existing: usize,
    ) -> Vec<CandidateBox> {
        let mut births = Vec::new();
        for det in detections {
            let candidates = self.tracks[..existing].iter().map(|t| &t.rect);
            match matching::best_match(candidates, &det.rect, self.config.match_iou) {
                Some(idx) => {
                    let track = &mut self.tracks[idx];
                    track.update(det, self.config.position_ema, self.config.score_ema);
                    trace!(track = %track.id, seen = track.seen_count, "matched");
                }
                None => births.push(*det),
            }
        }
        births
    }

    /// One-to-one assignment between tracks alive at frame start and detections.
    fn associate_optimal(
        &mut self,
        detections: &[CandidateBox],
        existing: usize,
    ) -> Vec<CandidateBox> {
        let track_rects: Vec<Rect> = self.tracks[..existing].iter().map(|t| t.rect).collect();
        let det_rects: Vec<Rect> = detections.iter().map(|d| d.rect).collect();
        let costs = matching::iou_distance(&track_rects, &det_rects);

        let AssignmentResult {
            mut matches,
            unmatched_detections,
            ..
        } = matching::linear_assignment(&costs, 1.0 - self.config.match_iou);

        matches.sort_by_key(|&(_, idet)| idet);
        for (itrack, idet) in matches {
            let track = &mut self.tracks[itrack];
            track.update(&detections[idet], self.config.position_ema, self.config.score_ema);
            trace!(track = %track.id, seen = track.seen_count, "matched");
        }

        unmatched_detections
            .into_iter()
            .map(|idet| detections[idet])
            .collect()
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Validate detections and clamp their scores into [0, 1].
fn sanitize(detections: &[CandidateBox]) -> Result<Vec<CandidateBox>> {
    detections
        .iter()
        .enumerate()
        .map(|(index, det)| {
            if !det.rect.is_well_formed() {
                return Err(Error::InvalidDetection {
                    index,
                    reason: "rect must be finite with non-negative extent",
                });
            }
            if !det.score.is_finite() {
                return Err(Error::InvalidDetection {
                    index,
                    reason: "score must be finite",
                });
            }
            Ok(CandidateBox {
                score: det.score.clamp(0.0, 1.0),
                ..*det
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackState;

    fn det(x: f32, y: f32, score: f32) -> CandidateBox {
        CandidateBox::new(Rect::new(x, y, 10.0, 10.0), score, 0)
    }

    #[test]
    fn test_enter_hysteresis() {
        let mut tracker = SmoothTracker::default();

        let out1 = tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        assert!(out1.is_empty());
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].state(tracker.config()), TrackState::Tentative);

        let out2 = tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        assert_eq!(out2.len(), 1);
        assert_eq!(out2[0].id, tracker.tracks()[0].id);
        assert_eq!(out2[0].state(tracker.config()), TrackState::Confirmed);
    }

    #[test]
    fn test_exit_hysteresis() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        let confirmed = tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        let id = confirmed[0].id;

        let mut last_score = confirmed[0].score;
        for missed in 1..=3 {
            let out = tracker.step(&[]).unwrap();
            assert_eq!(out.len(), 1, "missed frame {missed}");
            assert_eq!(out[0].id, id);
            assert_eq!(out[0].missed_count, missed);
            assert!(out[0].score < last_score);
            last_score = out[0].score;
        }

        let out = tracker.step(&[]).unwrap();
        assert!(out.is_empty());
        assert!(tracker.track(id).is_none());

        // a fresh detection at the same place starts a new identity
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        let out = tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_ne!(out[0].id, id);
    }

    #[test]
    fn test_decay_applies_multiplier() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 0.8)]).unwrap();
        tracker.step(&[]).unwrap();
        let track = &tracker.tracks()[0];
        assert!((track.score - 0.8 * 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_position_smoothing() {
        let mut tracker = SmoothTracker::new(TrackerConfig::default().with_match_iou(0.3)).unwrap();
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        // IoU between (0,0,10,10) and (2,0,10,10) is 80/120
        tracker.step(&[det(2.0, 0.0, 0.9)]).unwrap();
        assert_eq!(tracker.tracks()[0].rect, Rect::new(1.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_midpoint_update_with_low_match_iou() {
        let config = TrackerConfig::default().with_match_iou(0.0);
        let mut tracker = SmoothTracker::new(config).unwrap();
        tracker.step(&[CandidateBox::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0.9, 0)]).unwrap();
        // (0,0,10,10) vs (5,0,10,10) overlaps, so the track is pulled halfway
        tracker.step(&[CandidateBox::new(Rect::new(5.0, 0.0, 10.0, 10.0), 0.9, 0)]).unwrap();
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].rect, Rect::new(2.5, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_disjoint_detections_create_tracks() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 0.9), det(100.0, 100.0, 0.9)]).unwrap();
        let out = tracker.step(&[det(0.0, 0.0, 0.9), det(100.0, 100.0, 0.9)]).unwrap();
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].id, out[1].id);
    }

    #[test]
    fn test_greedy_allows_multi_match() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();

        // both detections claim the single track; no new track is born
        tracker.step(&[det(0.0, 0.0, 0.9), det(1.0, 0.0, 0.9)]).unwrap();
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].seen_count, 3);
    }

    #[test]
    fn test_optimal_is_one_to_one() {
        let config = TrackerConfig::default().with_assignment(AssignmentStrategy::Optimal);
        let mut tracker = SmoothTracker::new(config).unwrap();
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();

        tracker.step(&[det(1.0, 0.0, 0.9), det(0.0, 0.0, 0.9)]).unwrap();
        assert_eq!(tracker.tracks().len(), 2);
        let original = &tracker.tracks()[0];
        assert_eq!(original.seen_count, 2);
        assert_eq!(original.rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(tracker.tracks()[1].seen_count, 1);
    }

    #[test]
    fn test_low_score_not_reported() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 0.2)]).unwrap();
        let out = tracker.step(&[det(0.0, 0.0, 0.2)]).unwrap();
        assert!(out.is_empty());
        assert_eq!(tracker.tracks().len(), 1);
    }

    #[test]
    fn test_score_floor_evicts() {
        let mut tracker = SmoothTracker::default();
        // floor is 0.09; a 0.05 detection is evicted on the frame it is born
        let out = tracker.step(&[det(0.0, 0.0, 0.05)]).unwrap();
        assert!(out.is_empty());
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_decayed_score_evicts_before_exit_frames() {
        let config = TrackerConfig::default().with_unmatched_decay(0.5);
        let mut tracker = SmoothTracker::new(config).unwrap();
        tracker.step(&[det(0.0, 0.0, 0.15)]).unwrap();
        tracker.step(&[det(0.0, 0.0, 0.15)]).unwrap();
        let id = tracker.tracks()[0].id;
        assert_eq!(tracker.tracks()[0].seen_count, 2);

        // 0.15 is above the 0.09 floor, then decays to 0.075
        tracker.step(&[]).unwrap();
        assert!(tracker.track(id).is_some());
        assert!((tracker.tracks()[0].score - 0.075).abs() < 1e-6);

        // below the floor with only two misses, well within exit_frames
        tracker.step(&[]).unwrap();
        assert!(tracker.track(id).is_none());
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_invalid_detection_leaves_state_untouched() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        let snapshot = tracker.tracks().to_vec();

        let bad = CandidateBox::new(Rect::new(0.0, 0.0, f32::NAN, 10.0), 0.9, 0);
        let err = tracker.step(&[det(0.0, 0.0, 0.9), bad]).unwrap_err();
        assert!(matches!(err, Error::InvalidDetection { index: 1, .. }));
        assert_eq!(tracker.tracks(), snapshot.as_slice());
        assert_eq!(tracker.frame_count(), 1);
    }

    #[test]
    fn test_scores_are_clamped() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 1.7)]).unwrap();
        assert_eq!(tracker.tracks()[0].score, 1.0);
    }

    #[test]
    fn test_set_config_keeps_old_on_error() {
        let mut tracker = SmoothTracker::default();
        assert!(tracker.set_confidence_threshold(2.0).is_err());
        assert_eq!(tracker.config().confidence_threshold, 0.3);
        tracker.set_confidence_threshold(0.5).unwrap();
        assert_eq!(tracker.config().confidence_threshold, 0.5);
    }

    #[test]
    fn test_reset() {
        let mut tracker = SmoothTracker::default();
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        tracker.reset();
        assert!(tracker.tracks().is_empty());
        assert_eq!(tracker.frame_count(), 0);
        tracker.step(&[det(0.0, 0.0, 0.9)]).unwrap();
        assert_eq!(tracker.tracks()[0].id.get(), 1);
    }
}
