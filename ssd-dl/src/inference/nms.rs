use crate::common::*;

#[derive(Debug, Clone)]
pub struct NonMaxSuppressionInit {
    pub iou_threshold: R64,
    pub confidence_threshold: R64,
    /// The maximum number of boxes kept per call.
    pub keep: usize,
}

impl Default for NonMaxSuppressionInit {
    fn default() -> Self {
        Self {
            iou_threshold: r64(0.45),
            confidence_threshold: r64(0.01),
            keep: 200,
        }
    }
}

impl NonMaxSuppressionInit {
    pub fn build(self) -> Result<NonMaxSuppression> {
        let Self {
            iou_threshold,
            confidence_threshold,
            keep,
        } = self;

        ensure!(
            (0.0..=1.0).contains(&iou_threshold.raw()),
            "iou_threshold must be in range [0, 1], but get {}",
            iou_threshold
        );
        ensure!(
            confidence_threshold.raw().is_finite() && confidence_threshold >= 0.0,
            "confidence_threshold must be non-negative, but get {}",
            confidence_threshold
        );
        ensure!(keep > 0, "keep must be positive");

        Ok(NonMaxSuppression {
            iou_threshold: iou_threshold.raw() as f32,
            confidence_threshold: confidence_threshold.raw() as f32,
            keep,
        })
    }
}

/// Greedy single-class non-maximum suppression.
#[derive(Debug, Clone, CopyGetters)]
pub struct NonMaxSuppression {
    #[get_copy = "pub"]
    iou_threshold: f32,
    #[get_copy = "pub"]
    confidence_threshold: f32,
    #[get_copy = "pub"]
    keep: usize,
}

impl NonMaxSuppression {
    /// Select the surviving box indices of one class, in descending score order.
    ///
    /// Boxes scoring below the confidence threshold are never candidates.
    /// Equal scores are ordered by ascending box index.
    pub fn forward(&self, boxes: &[XYXY<f32>], scores: ArrayView1<f32>) -> Vec<usize> {
        debug_assert_eq!(boxes.len(), scores.len());

        let mut candidates: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|(_, &score)| score >= self.confidence_threshold)
            .map(|(index, _)| index)
            .collect();
        candidates.sort_by(|&lhs, &rhs| {
            scores[rhs]
                .partial_cmp(&scores[lhs])
                .unwrap_or(Ordering::Equal)
                .then_with(|| lhs.cmp(&rhs))
        });

        let mut suppressed = vec![false; candidates.len()];
        let mut kept = vec![];

        for (nth, &index) in candidates.iter().enumerate() {
            if suppressed[nth] {
                continue;
            }
            kept.push(index);
            if kept.len() >= self.keep {
                break;
            }

            let rect = &boxes[index];
            candidates
                .iter()
                .zip(suppressed.iter_mut())
                .skip(nth + 1)
                .filter(|(_, suppressed)| !**suppressed)
                .for_each(|(&other, suppressed)| {
                    if rect.iou_with(&boxes[other]) >= self.iou_threshold {
                        *suppressed = true;
                    }
                });
        }

        kept
    }
}
