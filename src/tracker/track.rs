//! Persistent per-object track state.

use std::fmt;

use crate::tracker::config::TrackerConfig;
use crate::tracker::matching::CandidateBox;
use crate::tracker::rect::{Rect, lerp};
use crate::tracker::track_state::TrackState;

/// Opaque track identifier, unique within one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackId(pub(crate) u64);

impl TrackId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Single object track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,
    /// Smoothed bounding box
    pub rect: Rect,
    /// Smoothed confidence score in [0, 1]
    pub score: f32,
    /// Class of the latest matched detection
    pub class_index: usize,
    /// Number of frames this track has been matched, including its birth
    pub seen_count: u32,
    /// Consecutive frames without a match
    pub missed_count: u32,
    /// Frames since the track was created
    pub age: u32,
}

impl Track {
    pub(crate) fn new(id: TrackId, det: &CandidateBox) -> Self {
        Self {
            id,
            rect: det.rect,
            score: det.score,
            class_index: det.class_index,
            seen_count: 1,
            missed_count: 0,
            age: 0,
        }
    }

    /// Fold a matched detection into the track.
    pub(crate) fn update(&mut self, det: &CandidateBox, position_ema: f32, score_ema: f32) {
        self.rect = self.rect.lerp(&det.rect, position_ema);
        self.score = lerp(self.score, det.score, score_ema).clamp(0.0, 1.0);
        self.class_index = det.class_index;
        self.seen_count = self.seen_count.saturating_add(1);
        self.missed_count = 0;
    }

    /// Start of frame: count a provisional miss, undone by a match.
    pub(crate) fn mark_missed(&mut self) {
        self.missed_count = self.missed_count.saturating_add(1);
        self.age = self.age.saturating_add(1);
    }

    pub(crate) fn decay(&mut self, factor: f32) {
        self.score = (self.score * factor).clamp(0.0, 1.0);
    }

    /// Whether the track must be evicted under `config`.
    pub fn is_expired(&self, config: &TrackerConfig) -> bool {
        self.missed_count > config.exit_frames || self.score < config.min_score_floor()
    }

    /// Whether the track passes the enter/exit hysteresis and is reported.
    pub fn is_reportable(&self, config: &TrackerConfig) -> bool {
        self.seen_count >= config.enter_frames
            && self.missed_count <= config.exit_frames
            && self.score >= config.confidence_threshold
    }

    /// Lifecycle state of the track under `config`.
    pub fn state(&self, config: &TrackerConfig) -> TrackState {
        if self.is_expired(config) {
            TrackState::Removed
        } else if self.missed_count > 0 {
            TrackState::Lost
        } else if self.seen_count >= config.enter_frames {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        }
    }

    /// The track as a plain output box.
    pub fn to_candidate(&self) -> CandidateBox {
        CandidateBox {
            rect: self.rect,
            score: self.score,
            class_index: self.class_index,
        }
    }
}
