//! Builder for flat detector output tensors.

use crate::integration::RawTensor;
use crate::postprocess::TensorLayout;

/// Assembles a [`RawTensor`] box by box.
///
/// Useful for synthesizing frames and for adapting detectors that emit boxes
/// one at a time.
#[derive(Debug, Clone)]
pub struct RawTensorBuilder {
    num_classes: usize,
    layout: TensorLayout,
    rows: Vec<Vec<f32>>,
}

impl Default for RawTensorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RawTensorBuilder {
    /// Create a builder for single-channel, box-major tensors.
    pub fn new() -> Self {
        Self {
            num_classes: 1,
            layout: TensorLayout::BoxMajor,
            rows: Vec::new(),
        }
    }

    pub fn num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Add a box in XYWH format (center_x, center_y, width, height).
    ///
    /// `scores` is padded with zeros or truncated to the channel count.
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32, scores: &[f32]) -> Self {
        let mut row = vec![cx, cy, w, h];
        row.extend((0..self.num_classes).map(|i| scores.get(i).copied().unwrap_or(0.0)));
        self.rows.push(row);
        self
    }

    /// Add a box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(self, x1: f32, y1: f32, x2: f32, y2: f32, scores: &[f32]) -> Self {
        let (w, h) = (x2 - x1, y2 - y1);
        self.xywh(x1 + w / 2.0, y1 + h / 2.0, w, h, scores)
    }

    /// Build the final `RawTensor`.
    pub fn build(self) -> RawTensor {
        let box_count = self.rows.len();
        let data = match self.layout {
            TensorLayout::BoxMajor => self.rows.into_iter().flatten().collect(),
            TensorLayout::ChannelMajor => {
                let stride = 4 + self.num_classes;
                (0..stride)
                    .flat_map(|j| self.rows.iter().map(move |row| row[j]))
                    .collect()
            }
        };
        RawTensor::new(data, box_count)
    }
}
