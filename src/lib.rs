//! Post-processing and temporal stabilization for single-stage object detectors.
//!
//! The crate turns the flat output tensor of a detector into a stable set of
//! boxes suitable for overlay rendering:
//!
//! 1. [`Decoder`] reads `(cx, cy, w, h, score...)` rows into [`CandidateBox`]es.
//! 2. [`suppress`] removes near-duplicates with greedy non-maximum suppression.
//! 3. [`SmoothTracker`] matches boxes to persistent tracks, smooths them with an
//!    exponential moving average and only reports tracks that survived the
//!    enter/exit hysteresis.
//!
//! [`DetectionPipeline`] wires all three stages behind a [`TensorSource`].

pub mod error;
pub mod integration;
pub mod postprocess;
pub mod tracker;

pub use error::{Error, Result};
pub use integration::{DetectionPipeline, PipelineConfig, RawTensor, RawTensorBuilder, TensorSource};
pub use postprocess::{
    CandidateBox, DecodedBoxes, Decoder, DecoderConfig, TensorLayout, suppress, suppress_per_class,
};
pub use tracker::{
    AssignmentStrategy, Rect, SmoothTracker, Track, TrackId, TrackState, TrackerConfig, lerp,
};
