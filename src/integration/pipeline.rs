//! DetectionPipeline for combining inference, post-processing and tracking.

use tracing::debug;

use crate::error::{Error, Result, check_unit};
use crate::postprocess::{Decoder, DecoderConfig, suppress, suppress_per_class};
use crate::tracker::{SmoothTracker, Track, TrackerConfig};

use super::{RawTensor, TensorSource};

/// Configuration of every stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Decode cutoff: boxes scoring below it are dropped
    pub score_threshold: f32,
    /// Boxes overlapping a better box by more than this are suppressed
    pub iou_threshold: f32,
    /// Only suppress boxes of the same class
    pub class_aware_nms: bool,
    pub decoder: DecoderConfig,
    pub tracker: TrackerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let tracker = TrackerConfig::default();
        Self {
            score_threshold: tracker.confidence_threshold,
            iou_threshold: 0.45,
            class_aware_nms: false,
            decoder: DecoderConfig::default(),
            tracker,
        }
    }
}

impl PipelineConfig {
    /// Set both the decode cutoff and the tracker's reporting threshold.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self.tracker.confidence_threshold = threshold;
        self
    }

    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("score_threshold", self.score_threshold)?;
        check_unit("iou_threshold", self.iou_threshold)?;
        self.decoder.validate()?;
        self.tracker.validate()
    }
}

/// Runs a [`TensorSource`] and turns its output into stable tracks.
///
/// Each frame goes through decode, suppression and one tracker step. A frame
/// that fails at any stage produces no output and leaves the tracker as it
/// was.
pub struct DetectionPipeline<S: TensorSource> {
    source: S,
    decoder: Decoder,
    tracker: SmoothTracker,
    config: PipelineConfig,
}

impl<S: TensorSource> DetectionPipeline<S> {
    /// Create a new pipeline with the given source and config.
    pub fn new(source: S, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            decoder: Decoder::new(config.decoder.clone())?,
            tracker: SmoothTracker::new(config.tracker.clone())?,
            config,
        })
    }

    /// Create a new pipeline with default configuration.
    pub fn with_default_config(source: S) -> Self {
        Self {
            source,
            decoder: Decoder::default(),
            tracker: SmoothTracker::default(),
            config: PipelineConfig::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replace the configuration. The old one is kept if `config` is invalid.
    ///
    /// Live tracks survive the change.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<()> {
        config.validate()?;
        self.decoder = Decoder::new(config.decoder.clone())?;
        self.tracker.set_config(config.tracker.clone())?;
        self.config = config;
        Ok(())
    }

    /// Change the confidence threshold used by decoding and reporting.
    pub fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        let config = self.config.clone().with_confidence_threshold(threshold);
        self.set_config(config)
    }

    /// Run inference on one frame and return the reported tracks.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    pub fn process_frame(&mut self, input: &[u8], width: u32, height: u32) -> Result<Vec<Track>> {
        let raw = self
            .source
            .infer(input, width, height)
            .map_err(|e| Error::Source(e.to_string()))?;
        self.process_tensor(&raw)
    }

    pub fn process_tensor(&mut self, tensor: &RawTensor) -> Result<Vec<Track>> {
        self.process_buffer(&tensor.data, tensor.box_count)
    }

    /// Post-process an already computed output buffer.
    pub fn process_buffer(&mut self, buffer: &[f32], box_count: usize) -> Result<Vec<Track>> {
        let decoded = self
            .decoder
            .decode(buffer, box_count, self.config.score_threshold)?;
        let boxes = if self.config.class_aware_nms {
            suppress_per_class(decoded, self.config.iou_threshold)?
        } else {
            suppress(decoded, self.config.iou_threshold)?
        };
        debug!(box_count, candidates = boxes.len(), "frame decoded");
        self.tracker.step(&boxes)
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &SmoothTracker {
        &self.tracker
    }

    /// Drop all tracks, keeping the configuration.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::RawTensorBuilder;

    struct MockSource {
        tensor: RawTensor,
        fail: bool,
    }

    impl TensorSource for MockSource {
        type Error = String;

        fn infer(
            &mut self,
            _input: &[u8],
            _width: u32,
            _height: u32,
        ) -> std::result::Result<RawTensor, String> {
            if self.fail {
                Err("device lost".to_string())
            } else {
                Ok(self.tensor.clone())
            }
        }
    }

    fn mock(tensor: RawTensor) -> MockSource {
        MockSource { tensor, fail: false }
    }

    #[test]
    fn test_pipeline_confirms_on_second_frame() {
        let tensor = RawTensorBuilder::new()
            .xywh(100.0, 100.0, 20.0, 20.0, &[0.9])
            .xywh(102.0, 101.0, 20.0, 20.0, &[0.8])
            .build();
        let mut pipeline = DetectionPipeline::with_default_config(mock(tensor));

        assert!(pipeline.process_frame(&[], 640, 640).unwrap().is_empty());
        assert_eq!(pipeline.tracker().tracks().len(), 1);

        let tracks = pipeline.process_frame(&[], 640, 640).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].rect.to_tlwh(), [90.0, 90.0, 20.0, 20.0]);
    }

    #[test]
    fn test_source_error_is_surfaced() {
        let mut source = mock(RawTensor::default());
        source.fail = true;
        let mut pipeline = DetectionPipeline::with_default_config(source);
        assert_eq!(
            pipeline.process_frame(&[], 640, 640).unwrap_err(),
            Error::Source("device lost".to_string())
        );
        assert_eq!(pipeline.tracker().frame_count(), 0);
    }

    #[test]
    fn test_shape_mismatch_leaves_tracker_untouched() {
        let mut pipeline = DetectionPipeline::with_default_config(mock(RawTensor::default()));
        pipeline.process_buffer(&[100.0, 100.0, 20.0, 20.0, 0.9], 1).unwrap();

        let err = pipeline.process_buffer(&[100.0, 100.0, 20.0, 20.0], 1).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 5, actual: 4 }));
        assert_eq!(pipeline.tracker().frame_count(), 1);
        assert_eq!(pipeline.tracker().tracks()[0].missed_count, 0);
    }

    #[test]
    fn test_set_confidence_threshold() {
        let mut pipeline = DetectionPipeline::with_default_config(mock(RawTensor::default()));
        pipeline.set_confidence_threshold(0.6).unwrap();
        assert_eq!(pipeline.config().score_threshold, 0.6);
        assert_eq!(pipeline.tracker().config().confidence_threshold, 0.6);

        assert!(pipeline.set_confidence_threshold(1.2).is_err());
        assert_eq!(pipeline.config().score_threshold, 0.6);

        // 0.5 is now below the decode cutoff
        pipeline.process_buffer(&[100.0, 100.0, 20.0, 20.0, 0.5], 1).unwrap();
        assert!(pipeline.tracker().tracks().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig::default().with_iou_threshold(-1.0);
        assert!(DetectionPipeline::new(mock(RawTensor::default()), config).is_err());
    }
}
