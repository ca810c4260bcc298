//! Trait for the external inference step.

use std::fmt::Display;

/// Flat detector output for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTensor {
    /// Box parameters, laid out as the decoder expects
    pub data: Vec<f32>,
    /// Number of boxes in `data`
    pub box_count: usize,
}

impl RawTensor {
    pub fn new(data: Vec<f32>, box_count: usize) -> Self {
        Self { data, box_count }
    }
}

/// Runs the detection network on a frame.
///
/// # Example
///
/// ```ignore
/// use stabletrack::{RawTensor, TensorSource};
///
/// struct MyModel {
///     // Your inference session here
/// }
///
/// impl TensorSource for MyModel {
///     type Error = std::io::Error;
///
///     fn infer(&mut self, input: &[u8], width: u32, height: u32) -> Result<RawTensor, Self::Error> {
///         // Run inference and return the flat output tensor
///         Ok(RawTensor::default())
///     }
/// }
/// ```
pub trait TensorSource {
    /// Error type for inference failures.
    type Error: Display;

    /// Run inference on raw image data.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes, already resized to the model canvas
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    fn infer(&mut self, input: &[u8], width: u32, height: u32) -> Result<RawTensor, Self::Error>;
}
