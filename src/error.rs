use thiserror::Error;

/// Errors produced while post-processing or tracking a frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The output buffer does not hold `box_count` complete rows.
    #[error("tensor shape mismatch: expected {expected} floats, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A configuration value is outside its accepted range.
    #[error("invalid configuration: `{field}` = {value} ({reason})")]
    InvalidConfiguration {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A detection handed to the tracker cannot be tracked.
    #[error("invalid detection at index {index}: {reason}")]
    InvalidDetection { index: usize, reason: &'static str },

    /// The external inference step failed.
    #[error("tensor source failed: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check that `value` lies in `[0, 1]`.
pub(crate) fn check_unit(field: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration {
            field,
            value: value as f64,
            reason: "must be within [0, 1]",
        })
    }
}
