//! Ground truth to default box matching.

use crate::{common::*, dbox::DefaultBoxes};

#[derive(Debug, Clone)]
pub struct BoxMatcherInit {
    /// The IoU at or above which a default box matches its best ground truth.
    pub iou_threshold: R64,
}

impl Default for BoxMatcherInit {
    fn default() -> Self {
        Self {
            iou_threshold: r64(0.5),
        }
    }
}

impl BoxMatcherInit {
    pub fn build(self) -> Result<BoxMatcher> {
        let Self { iou_threshold } = self;
        ensure!(
            (0.0..=1.0).contains(&iou_threshold.raw()),
            "iou_threshold must be in range [0, 1], but get {}",
            iou_threshold
        );
        Ok(BoxMatcher {
            iou_threshold: iou_threshold.raw() as f32,
        })
    }
}

/// The assignment of one default box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchEntry {
    /// The matched ground truth index, `None` for background.
    pub ground_truth: Option<usize>,
    /// The IoU with the matched ground truth, or the best IoU seen for background.
    pub iou: f32,
    /// Whether the default box was claimed as the best box of its ground truth.
    pub forced: bool,
}

/// The matching result of one image, one entry per default box.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct BoxMatching {
    #[get = "pub"]
    entries: Vec<MatchEntry>,
    #[get_copy = "pub"]
    num_ground_truths: usize,
}

impl BoxMatching {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn positive_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.ground_truth.map(|_| index))
    }

    pub fn num_positives(&self) -> usize {
        self.positive_indices().count()
    }
}

/// Two-pass greedy matcher.
///
/// Every default box takes its best ground truth if their IoU reaches the
/// threshold. Before that, every ground truth claims its best default box
/// regardless of the threshold, so no ground truth is left unmatched. Claims
/// go in ground truth order and never override an earlier claim: a ground
/// truth whose best box is taken claims its best unclaimed box instead, even
/// at a low IoU. Ties resolve to the lowest index.
#[derive(Debug, Clone)]
pub struct BoxMatcher {
    iou_threshold: f32,
}

impl BoxMatcher {
    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    /// Match the ground truth boxes of one image to the default boxes.
    ///
    /// Degenerate ground truth boxes are rejected and must be filtered by the caller.
    pub fn match_boxes(
        &self,
        dboxes: &DefaultBoxes,
        ground_truths: &[XYXY<f32>],
    ) -> Result<BoxMatching> {
        let corners = dboxes.corners();
        let n_dboxes = corners.len();
        let n_gts = ground_truths.len();

        for (index, gt) in ground_truths.iter().enumerate() {
            ensure!(
                !gt.is_degenerate(),
                "ground truth {} has zero area: {:?}",
                index,
                gt.xyxy()
            );
        }

        if n_gts == 0 {
            let entries = vec![
                MatchEntry {
                    ground_truth: None,
                    iou: 0.0,
                    forced: false,
                };
                n_dboxes
            ];
            return Ok(BoxMatching {
                entries,
                num_ground_truths: 0,
            });
        }

        ensure!(
            n_gts <= n_dboxes,
            "cannot match {} ground truths to {} default boxes",
            n_gts,
            n_dboxes
        );

        // IoU matrix in (dbox, gt) order
        let ious = Array2::from_shape_fn((n_dboxes, n_gts), |(dbox_index, gt_index)| {
            corners[dbox_index].iou_with(&ground_truths[gt_index])
        });

        // pass A: the best ground truth of every default box
        let best_gts: Vec<(usize, f32)> = ious
            .outer_iter()
            .map(|row| argmax_first(row.iter().cloned()))
            .collect();

        // pass B: every ground truth claims its best unclaimed default box
        let mut forced: Vec<Option<usize>> = vec![None; n_dboxes];
        for gt_index in 0..n_gts {
            let column = ious.column(gt_index);
            let candidates = column
                .iter()
                .cloned()
                .zip(&forced)
                .map(|(iou, claim)| if claim.is_some() { f32::NEG_INFINITY } else { iou });
            let (dbox_index, _) = argmax_first(candidates);
            forced[dbox_index] = Some(gt_index);
        }

        let threshold = self.iou_threshold;
        let entries: Vec<_> = izip!(&best_gts, &forced)
            .enumerate()
            .map(|(dbox_index, (&(best_gt, best_iou), &forced_gt))| match forced_gt {
                Some(gt_index) => MatchEntry {
                    ground_truth: Some(gt_index),
                    iou: ious[[dbox_index, gt_index]],
                    forced: true,
                },
                None if best_iou >= threshold => MatchEntry {
                    ground_truth: Some(best_gt),
                    iou: best_iou,
                    forced: false,
                },
                None => MatchEntry {
                    ground_truth: None,
                    iou: best_iou,
                    forced: false,
                },
            })
            .collect();

        Ok(BoxMatching {
            entries,
            num_ground_truths: n_gts,
        })
    }
}

/// The index and value of the maximum, preferring the first on ties.
fn argmax_first(values: impl IntoIterator<Item = f32>) -> (usize, f32) {
    values
        .into_iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_index, best), (index, value)| {
            if value > best {
                (index, value)
            } else {
                (best_index, best)
            }
        })
}
