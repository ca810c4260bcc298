mod config;
mod matching;
mod rect;
mod smooth_tracker;
mod track;
mod track_state;

pub use config::{AssignmentStrategy, TrackerConfig};
pub use matching::{AssignmentResult, CandidateBox, best_match, iou_distance, linear_assignment};
pub use rect::{Rect, iou_batch, lerp};
pub use smooth_tracker::SmoothTracker;
pub use track::{Track, TrackId};
pub use track_state::TrackState;
