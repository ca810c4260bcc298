//! Greedy non-maximum suppression.

use tracing::debug;

use crate::error::{Result, check_unit};
use crate::tracker::CandidateBox;

/// Remove boxes overlapping a higher-scoring box by more than `iou_threshold`.
///
/// Survivors are returned by descending score; equal scores keep their input
/// order.
pub fn suppress<I>(boxes: I, iou_threshold: f32) -> Result<Vec<CandidateBox>>
where
    I: IntoIterator<Item = CandidateBox>,
{
    non_max_suppression(boxes, iou_threshold, false)
}

/// Like [`suppress`], but boxes only suppress others of the same class.
pub fn suppress_per_class<I>(boxes: I, iou_threshold: f32) -> Result<Vec<CandidateBox>>
where
    I: IntoIterator<Item = CandidateBox>,
{
    non_max_suppression(boxes, iou_threshold, true)
}

fn non_max_suppression<I>(
    boxes: I,
    iou_threshold: f32,
    per_class: bool,
) -> Result<Vec<CandidateBox>>
where
    I: IntoIterator<Item = CandidateBox>,
{
    check_unit("iou_threshold", iou_threshold)?;

    let mut candidates: Vec<CandidateBox> = boxes.into_iter().collect();
    let total = candidates.len();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<CandidateBox> = Vec::new();
    'outer: for candidate in candidates {
        for k in &kept {
            if per_class && k.class_index != candidate.class_index {
                continue;
            }
            if k.rect.iou(&candidate.rect) > iou_threshold {
                continue 'outer;
            }
        }
        kept.push(candidate);
    }

    debug!(total, kept = kept.len(), "non-maximum suppression");
    Ok(kept)
}
