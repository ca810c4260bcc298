/// Lifecycle state of a track, derived from its hit and miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackState {
    /// Matched fewer than `enter_frames` times, not reported yet
    #[default]
    Tentative,
    /// Matched often enough to be reported
    Confirmed,
    /// Missed in the latest frame(s), score decaying
    Lost,
    /// Evicted from the tracker, terminal
    Removed,
}

impl TrackState {
    /// Whether the track still lives in the tracker.
    pub fn is_live(self) -> bool {
        self != TrackState::Removed
    }
}
