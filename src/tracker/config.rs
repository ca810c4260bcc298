use crate::error::{Error, Result, check_unit};

/// How detections are paired with existing tracks each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssignmentStrategy {
    /// Each detection, in input order, takes the live track with the highest
    /// IoU. A track may be claimed by several detections in one frame; the
    /// last one wins.
    #[default]
    Greedy,
    /// One-to-one assignment maximizing total IoU.
    Optimal,
}

/// Configuration for the [`SmoothTracker`](crate::tracker::SmoothTracker).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Minimum smoothed score for a track to be reported
    pub confidence_threshold: f32,
    /// EMA weight of a new detection's position
    pub position_ema: f32,
    /// EMA weight of a new detection's score
    pub score_ema: f32,
    /// Minimum IoU (exclusive) for a detection to match a track
    pub match_iou: f32,
    /// Matched frames required before a track is reported
    pub enter_frames: u32,
    /// Consecutive missed frames tolerated before eviction
    pub exit_frames: u32,
    /// Score multiplier applied each frame a track goes unmatched
    pub unmatched_decay: f32,
    /// Eviction floor as a fraction of `confidence_threshold`
    pub min_score_floor_ratio: f32,
    pub assignment: AssignmentStrategy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            position_ema: 0.5,
            score_ema: 0.5,
            match_iou: 0.5,
            enter_frames: 2,
            exit_frames: 3,
            unmatched_decay: 0.85,
            min_score_floor_ratio: 0.3,
            assignment: AssignmentStrategy::Greedy,
        }
    }
}

impl TrackerConfig {
    /// Hard eviction floor for track scores.
    pub fn min_score_floor(&self) -> f32 {
        self.confidence_threshold * self.min_score_floor_ratio
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_ema(mut self, position: f32, score: f32) -> Self {
        self.position_ema = position;
        self.score_ema = score;
        self
    }

    pub fn with_match_iou(mut self, match_iou: f32) -> Self {
        self.match_iou = match_iou;
        self
    }

    pub fn with_hysteresis(mut self, enter_frames: u32, exit_frames: u32) -> Self {
        self.enter_frames = enter_frames;
        self.exit_frames = exit_frames;
        self
    }

    pub fn with_unmatched_decay(mut self, decay: f32) -> Self {
        self.unmatched_decay = decay;
        self
    }

    pub fn with_assignment(mut self, assignment: AssignmentStrategy) -> Self {
        self.assignment = assignment;
        self
    }

    /// Reject values outside their accepted ranges.
    pub fn validate(&self) -> Result<()> {
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("position_ema", self.position_ema)?;
        check_unit("score_ema", self.score_ema)?;
        check_unit("match_iou", self.match_iou)?;
        check_unit("unmatched_decay", self.unmatched_decay)?;
        check_unit("min_score_floor_ratio", self.min_score_floor_ratio)?;
        if self.enter_frames < 1 {
            return Err(Error::InvalidConfiguration {
                field: "enter_frames",
                value: self.enter_frames as f64,
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
