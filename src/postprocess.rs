//! Stateless per-frame transforms: tensor decoding and duplicate suppression.

mod decoder;
mod suppression;

pub use crate::tracker::CandidateBox;
pub use decoder::{DecodedBoxes, Decoder, DecoderConfig, TensorLayout};
pub use suppression::{suppress, suppress_per_class};
