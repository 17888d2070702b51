//! Post-processing from decoded boxes and class scores to detections.

mod nms;
pub use nms::*;

use crate::{class::ClassSpace, common::*};

/// A final detection in normalized image coordinates.
///
/// The class is the object label with the background logit removed.
pub type Detection = ScoredLabel<XYXY<f32>, usize, f32>;

#[derive(Debug, Clone)]
pub struct InferenceBoxInit {
    pub conf_threshold: R64,
    pub nms_iou_threshold: R64,
    /// The maximum number of detections per image.
    pub top_k: usize,
    /// The maximum number of detections per class and image.
    pub keep_per_class: usize,
    pub class_space: ClassSpace,
}

impl InferenceBoxInit {
    pub fn new(class_space: ClassSpace) -> Self {
        let NonMaxSuppressionInit {
            iou_threshold,
            confidence_threshold,
            keep,
        } = NonMaxSuppressionInit::default();

        Self {
            conf_threshold: confidence_threshold,
            nms_iou_threshold: iou_threshold,
            top_k: keep,
            keep_per_class: keep,
            class_space,
        }
    }

    pub fn build(self) -> Result<InferenceBox> {
        let Self {
            conf_threshold,
            nms_iou_threshold,
            top_k,
            keep_per_class,
            class_space,
        } = self;

        ensure!(top_k > 0, "top_k must be positive");
        let nms = NonMaxSuppressionInit {
            iou_threshold: nms_iou_threshold,
            confidence_threshold: conf_threshold,
            keep: keep_per_class,
        }
        .build()?;

        Ok(InferenceBox {
            nms,
            top_k,
            class_space,
        })
    }
}

/// Per-class confidence filtering and NMS, capped per image.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct InferenceBox {
    #[get = "pub"]
    nms: NonMaxSuppression,
    #[get_copy = "pub"]
    top_k: usize,
    #[get_copy = "pub"]
    class_space: ClassSpace,
}

impl InferenceBox {
    /// Produce the detections of one image.
    ///
    /// `scores` is the activated `(boxes, class_nums)` score matrix aligned
    /// with `boxes`. The output is sorted by descending score, ties broken by
    /// ascending object label then box index.
    pub fn forward(&self, boxes: &[XYXY<f32>], scores: ArrayView2<f32>) -> Result<Vec<Detection>> {
        ensure!(
            scores.dim() == (boxes.len(), self.class_space.class_nums()),
            "expect scores of shape {:?}, but get {:?}",
            (boxes.len(), self.class_space.class_nums()),
            scores.dim()
        );

        let mut detections: Vec<(usize, Detection)> = self
            .class_space
            .object_logits()
            .flat_map(|logit| {
                let class_scores = scores.index_axis_move(Axis(1), logit);
                let class = logit - self.class_space.object_logits().start;

                self.nms
                    .forward(boxes, class_scores)
                    .into_iter()
                    .map(move |index| {
                        let detection = Detection {
                            rect: boxes[index],
                            class,
                            score: class_scores[index],
                        };
                        (index, detection)
                    })
            })
            .collect();

        // ties: lower label first, then lower box index
        detections.sort_by(|(lhs_index, lhs), (rhs_index, rhs)| {
            rhs.score
                .partial_cmp(&lhs.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| lhs.class.cmp(&rhs.class))
                .then_with(|| lhs_index.cmp(rhs_index))
        });
        detections.truncate(self.top_k);

        Ok(detections
            .into_iter()
            .map(|(_, detection)| detection)
            .collect())
    }
}
