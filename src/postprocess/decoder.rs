//! Decoding of raw detector output into candidate boxes.

use ndarray::ArrayView2;
use tracing::{trace, warn};

use crate::error::{Error, Result, check_unit};
use crate::tracker::{CandidateBox, Rect};

/// Number of geometry values (cx, cy, w, h) leading every box.
const BOX_PARAMS: usize = 4;

/// Memory layout of the flat output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TensorLayout {
    /// `box_count` rows of `(cx, cy, w, h, score_0, .., score_n)`.
    #[default]
    BoxMajor,
    /// One plane of `box_count` values per parameter, as exported by YOLOv8
    /// (`[1, 4 + n, box_count]`).
    ChannelMajor,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecoderConfig {
    /// Width of the model input canvas in pixels
    pub canvas_width: u32,
    /// Height of the model input canvas in pixels
    pub canvas_height: u32,
    /// Confidence channels per box
    pub num_classes: usize,
    pub layout: TensorLayout,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            canvas_width: 640,
            canvas_height: 640,
            num_classes: 1,
            layout: TensorLayout::BoxMajor,
        }
    }
}

impl DecoderConfig {
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Floats per box.
    pub fn stride(&self) -> usize {
        BOX_PARAMS + self.num_classes
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(Error::InvalidConfiguration {
                field: "canvas",
                value: self.canvas_width.min(self.canvas_height) as f64,
                reason: "canvas dimensions must be positive",
            });
        }
        if self.num_classes == 0 {
            return Err(Error::InvalidConfiguration {
                field: "num_classes",
                value: 0.0,
                reason: "at least one confidence channel is required",
            });
        }
        Ok(())
    }
}

/// Converts flat detector output into [`CandidateBox`]es on the model canvas.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Number of floats a buffer holding `box_count` boxes must contain.
    ///
    /// `None` when the count overflows `usize`.
    pub fn expected_len(&self, box_count: usize) -> Option<usize> {
        box_count.checked_mul(self.config.stride())
    }

    /// Decode `box_count` boxes from `buffer`, dropping those scoring below
    /// `score_threshold`.
    ///
    /// The buffer length is checked up front; boxes are then produced lazily
    /// in buffer order.
    pub fn decode<'a>(
        &self,
        buffer: &'a [f32],
        box_count: usize,
        score_threshold: f32,
    ) -> Result<DecodedBoxes<'a>> {
        check_unit("score_threshold", score_threshold)?;

        let stride = self.config.stride();
        let expected = self.expected_len(box_count).unwrap_or(usize::MAX);
        if buffer.len() != expected {
            warn!(expected, actual = buffer.len(), "rejecting malformed output tensor");
            return Err(Error::ShapeMismatch {
                expected,
                actual: buffer.len(),
            });
        }

        let mismatch = |_| Error::ShapeMismatch {
            expected,
            actual: buffer.len(),
        };
        let rows = match self.config.layout {
            TensorLayout::BoxMajor => {
                ArrayView2::from_shape((box_count, stride), buffer).map_err(mismatch)?
            }
            TensorLayout::ChannelMajor => ArrayView2::from_shape((stride, box_count), buffer)
                .map_err(mismatch)?
                .reversed_axes(),
        };

        Ok(DecodedBoxes {
            rows,
            next: 0,
            score_threshold,
            canvas_width: self.config.canvas_width as f32,
            canvas_height: self.config.canvas_height as f32,
        })
    }
}

/// Lazy iterator over the boxes of one decoded frame.
#[derive(Debug)]
pub struct DecodedBoxes<'a> {
    rows: ArrayView2<'a, f32>,
    next: usize,
    score_threshold: f32,
    canvas_width: f32,
    canvas_height: f32,
}

impl DecodedBoxes<'_> {
    /// Best confidence channel of `row`; ties keep the lowest index.
    ///
    /// Channels never beat a score of zero, so an all-negative row reads as
    /// class 0 with score 0.
    fn best_class(&self, row: usize) -> (usize, f32) {
        let stride = self.rows.ncols();
        let mut best_index = 0;
        let mut best_score = 0.0;
        for class in 0..stride - BOX_PARAMS {
            let score = self.rows[[row, BOX_PARAMS + class]];
            if score > best_score {
                best_score = score;
                best_index = class;
            }
        }
        (best_index, best_score)
    }

    fn read_box(&self, row: usize) -> Option<CandidateBox> {
        let (class_index, score) = self.best_class(row);
        let score = score.clamp(0.0, 1.0);
        // NaN scores never pass
        if !(score >= self.score_threshold) {
            return None;
        }

        let cx = self.rows[[row, 0]];
        let cy = self.rows[[row, 1]];
        let w = self.rows[[row, 2]];
        let h = self.rows[[row, 3]];
        if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
            trace!(row, "skipping box with non-finite geometry");
            return None;
        }

        let rect = Rect::from_center(cx, cy, w, h)
            .clamp_to_canvas(self.canvas_width, self.canvas_height);
        Some(CandidateBox::new(rect, score, class_index))
    }
}

impl Iterator for DecodedBoxes<'_> {
    type Item = CandidateBox;

    fn next(&mut self) -> Option<CandidateBox> {
        while self.next < self.rows.nrows() {
            let row = self.next;
            self.next += 1;
            if let Some(candidate) = self.read_box(row) {
                return Some(candidate);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.rows.nrows() - self.next))
    }
}

impl std::iter::FusedIterator for DecodedBoxes<'_> {}
