//! Matching utilities for multi-object tracking.

use ndarray::Array2;

use crate::tracker::rect::{Rect, iou_batch};

/// A decoded detection: box, confidence and class.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidateBox {
    /// Bounding box in canvas pixels
    pub rect: Rect,
    /// Detection confidence score
    pub score: f32,
    /// Index of the winning confidence channel
    pub class_index: usize,
}

impl CandidateBox {
    pub fn new(rect: Rect, score: f32, class_index: usize) -> Self {
        Self {
            rect,
            score,
            class_index,
        }
    }

    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self::new(Rect::from_tlbr(x1, y1, x2, y2), score, 0)
    }
}

/// Index of the rect with the highest IoU strictly above `min_iou`.
///
/// Ties keep the earliest candidate.
pub fn best_match<'a, I>(candidates: I, target: &Rect, min_iou: f32) -> Option<usize>
where
    I: IntoIterator<Item = &'a Rect>,
{
    let mut best: Option<(usize, f32)> = None;
    for (i, rect) in candidates.into_iter().enumerate() {
        let iou = rect.iou(target);
        if iou <= min_iou {
            continue;
        }
        match best {
            Some((_, best_iou)) if iou <= best_iou => {}
            _ => best = Some((i, iou)),
        }
    }
    best.map(|(i, _)| i)
}

/// Compute IoU distance matrix between tracks and detections.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    iou_batch(track_boxes, det_boxes).mapv(|iou| 1.0 - iou)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// One-to-one assignment minimizing total cost.
///
/// Pairs whose cost is not strictly below `max_cost` are left unmatched.
pub fn linear_assignment(cost_matrix: &Array2<f32>, max_cost: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);

    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] < max_cost {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(err) => {
            tracing::warn!(?err, "assignment solver failed, leaving all pairs unmatched");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_match_picks_highest_iou() {
        let tracks = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(1.0, 0.0, 10.0, 10.0),
            Rect::new(100.0, 0.0, 10.0, 10.0),
        ];
        let target = Rect::new(1.0, 0.0, 10.0, 10.0);
        assert_eq!(best_match(&tracks, &target, 0.5), Some(1));
    }

    #[test]
    fn test_best_match_ties_keep_first() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(0.0, 0.0, 10.0, 10.0)];
        let target = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(best_match(&tracks, &target, 0.5), Some(0));
    }

    #[test]
    fn test_best_match_threshold_is_strict() {
        // IoU of exactly 0.5: 10x10 against 10x20 sharing the top half
        let tracks = [Rect::new(0.0, 0.0, 10.0, 20.0)];
        let target = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(best_match(&tracks, &target, 0.5), None);
        assert_eq!(best_match(&tracks, &target, 0.49), Some(0));
    }

    #[test]
    fn test_linear_assignment_is_one_to_one() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0)];
        let dets = [Rect::new(1.0, 0.0, 10.0, 10.0), Rect::new(0.0, 0.0, 10.0, 10.0)];
        let costs = iou_distance(&tracks, &dets);
        let result = linear_assignment(&costs, 0.5);

        assert_eq!(result.matches, vec![(0, 1)]);
        assert!(result.unmatched_tracks.is_empty());
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_linear_assignment_rejects_costly_pairs() {
        let tracks = [Rect::new(0.0, 0.0, 10.0, 10.0)];
        let dets = [Rect::new(200.0, 0.0, 10.0, 10.0)];
        let result = linear_assignment(&iou_distance(&tracks, &dets), 0.5);

        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_linear_assignment_empty() {
        let result = linear_assignment(&Array2::zeros((0, 3)), 0.5);
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);

        let result = linear_assignment(&Array2::zeros((2, 0)), 0.5);
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
    }
}
