//! Integration module for connecting a detector's inference step with the
//! post-processing pipeline.
//!
//! Model loading and execution stay outside this crate: implement
//! [`TensorSource`] for whatever runs the network and hand it to a
//! [`DetectionPipeline`].

mod builder;
mod pipeline;
mod source;

pub use builder::RawTensorBuilder;
pub use pipeline::{DetectionPipeline, PipelineConfig};
pub use source::{RawTensor, TensorSource};
