//! Offset encoding between ground truth boxes and default boxes.

use crate::{
    class::{ClassSpace, ClassTarget},
    common::*,
    dbox::DefaultBoxes,
    matching::BoxMatching,
};

/// The default bound of the scaled log-size offset before exponentiation.
pub static DEFAULT_DECODE_CLIP: Lazy<R64> = Lazy::new(|| r64((1000.0f64 / 16.0).ln()));

#[derive(Debug, Clone)]
pub struct CodecInit {
    pub variance_center: R64,
    pub variance_size: R64,
    /// The upper bound of `tw * variance_size` and `th * variance_size` when decoding.
    pub decode_clip: R64,
    pub class_space: ClassSpace,
}

impl CodecInit {
    pub fn new(class_space: ClassSpace) -> Self {
        Self {
            variance_center: r64(0.1),
            variance_size: r64(0.2),
            decode_clip: *DEFAULT_DECODE_CLIP,
            class_space,
        }
    }

    pub fn build(self) -> Result<Codec> {
        let Self {
            variance_center,
            variance_size,
            decode_clip,
            class_space,
        } = self;

        ensure!(
            variance_center.raw().is_finite() && variance_center > 0.0,
            "variance_center must be positive and finite, but get {}",
            variance_center
        );
        ensure!(
            variance_size.raw().is_finite() && variance_size > 0.0,
            "variance_size must be positive and finite, but get {}",
            variance_size
        );
        ensure!(
            decode_clip.raw().is_finite(),
            "decode_clip must be finite, but get {}",
            decode_clip
        );

        Ok(Codec {
            variance: Variance {
                center: variance_center.raw() as f32,
                size: variance_size.raw() as f32,
            },
            decode_clip: decode_clip.raw() as f32,
            class_space,
        })
    }
}

/// The rescaling constants of the offset parameterization.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
pub struct Variance {
    #[get_copy = "pub"]
    center: f32,
    #[get_copy = "pub"]
    size: f32,
}

/// Encoder and decoder sharing one [Variance].
#[derive(Debug, Clone, CopyGetters)]
pub struct Codec {
    #[get_copy = "pub"]
    variance: Variance,
    #[get_copy = "pub"]
    decode_clip: f32,
    #[get_copy = "pub"]
    class_space: ClassSpace,
}

impl Codec {
    /// Encode a ground truth box against a default box into `[tx, ty, tw, th]`.
    ///
    /// Both boxes must have positive width and height.
    pub fn encode(&self, gt: &CxCyWH<f32>, dbox: &CxCyWH<f32>) -> [f32; 4] {
        debug_assert!(!gt.is_degenerate() && !dbox.is_degenerate());
        let Variance { center, size } = self.variance;

        let tx = (gt.cx() - dbox.cx()) / dbox.w() / center;
        let ty = (gt.cy() - dbox.cy()) / dbox.h() / center;
        let tw = (gt.w() / dbox.w()).ln() / size;
        let th = (gt.h() / dbox.h()).ln() / size;
        [tx, ty, tw, th]
    }

    /// Decode `[tx, ty, tw, th]` against a default box without clamping to the image.
    pub fn decode_unclamped(&self, offsets: [f32; 4], dbox: &CxCyWH<f32>) -> CxCyWH<f32> {
        let Variance { center, size } = self.variance;
        let [tx, ty, tw, th] = offsets;

        let cx = tx * center * dbox.w() + dbox.cx();
        let cy = ty * center * dbox.h() + dbox.cy();
        let clip = |offset: f32| {
            // f32::min() drops NaN, so a NaN offset maps to zero extent here
            if offset.is_nan() {
                f32::NEG_INFINITY
            } else {
                offset.min(self.decode_clip)
            }
        };
        let w = clip(tw * size).exp() * dbox.w();
        let h = clip(th * size).exp() * dbox.h();

        let w = if w >= 0.0 { w } else { 0.0 };
        let h = if h >= 0.0 { h } else { 0.0 };
        CxCyWH::from_cxcywh([cx, cy, w, h])
    }

    /// Decode `[tx, ty, tw, th]` against a default box into a corner box inside the unit square.
    pub fn decode(&self, offsets: [f32; 4], dbox: &CxCyWH<f32>) -> XYXY<f32> {
        self.decode_unclamped(offsets, dbox).clamp_unit()
    }

    /// Decode a `(boxes, 4)` offset matrix of one image, in default box order.
    pub fn decode_all(
        &self,
        dboxes: &DefaultBoxes,
        loc: ArrayView2<f32>,
    ) -> Result<Vec<XYXY<f32>>> {
        ensure!(
            loc.dim() == (dboxes.len(), 4),
            "expect location offsets of shape {:?}, but get {:?}",
            (dboxes.len(), 4),
            loc.dim()
        );

        let decoded = izip!(loc.outer_iter(), dboxes.boxes())
            .map(|(offsets, dbox)| {
                let offsets = [offsets[0], offsets[1], offsets[2], offsets[3]];
                self.decode(offsets, dbox)
            })
            .collect();
        Ok(decoded)
    }

    /// Build regression and classification targets of one image from its matching.
    pub fn encode_targets(
        &self,
        dboxes: &DefaultBoxes,
        matching: &BoxMatching,
        ground_truths: &[Label<XYXY<f32>, usize>],
    ) -> Result<TrainingTargets> {
        ensure!(
            matching.len() == dboxes.len(),
            "the matching covers {} default boxes, but the grid has {}",
            matching.len(),
            dboxes.len()
        );
        ensure!(
            matching.num_ground_truths() == ground_truths.len(),
            "the matching was built from {} ground truths, but get {}",
            matching.num_ground_truths(),
            ground_truths.len()
        );

        let gt_logits: Vec<usize> = ground_truths
            .iter()
            .map(|gt| self.class_space.logit_of(gt.class))
            .collect::<Result<_>>()?;
        let gt_boxes: Vec<CxCyWH<f32>> = ground_truths
            .iter()
            .map(|gt| gt.rect.to_cxcywh())
            .collect();

        let background_logit = self.class_space.background_logit();
        let (regression, (classes, logits)): (Vec<_>, (Vec<_>, Vec<_>)) =
            izip!(matching.entries(), dboxes.boxes())
                .map(|(entry, dbox)| match entry.ground_truth {
                    Some(gt_index) => {
                        let offsets = self.encode(&gt_boxes[gt_index], dbox);
                        let class = ground_truths[gt_index].class;
                        (
                            Some(offsets),
                            (ClassTarget::Object(class), Some(gt_logits[gt_index])),
                        )
                    }
                    None => (None, (ClassTarget::Background, background_logit)),
                })
                .unzip();

        Ok(TrainingTargets {
            variance: self.variance,
            class_space: self.class_space,
            regression,
            classes,
            logits,
        })
    }

    /// Decode regression targets back into boxes, `None` for background.
    ///
    /// The targets must have been encoded with the same variance.
    pub fn decode_targets(
        &self,
        dboxes: &DefaultBoxes,
        targets: &TrainingTargets,
    ) -> Result<Vec<Option<XYXY<f32>>>> {
        ensure!(
            targets.variance == self.variance,
            "variance mismatch: targets were encoded with {:?}, but the decoder uses {:?}",
            targets.variance,
            self.variance
        );
        ensure!(
            targets.len() == dboxes.len(),
            "the targets cover {} default boxes, but the grid has {}",
            targets.len(),
            dboxes.len()
        );

        let decoded = izip!(&targets.regression, dboxes.boxes())
            .map(|(offsets, dbox)| offsets.map(|offsets| self.decode(offsets, dbox)))
            .collect();
        Ok(decoded)
    }
}

/// The training targets of one image, one entry per default box.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct TrainingTargets {
    /// The variance the regression targets were encoded with.
    #[get_copy = "pub"]
    variance: Variance,
    #[get_copy = "pub"]
    class_space: ClassSpace,
    /// Encoded offsets of matched default boxes.
    #[get = "pub"]
    regression: Vec<Option<[f32; 4]>>,
    #[get = "pub"]
    classes: Vec<ClassTarget>,
    /// The logit each default box trains, `None` for background without a background logit.
    #[get = "pub"]
    logits: Vec<Option<usize>>,
}

impl TrainingTargets {
    pub fn len(&self) -> usize {
        self.regression.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regression.is_empty()
    }

    pub fn positive_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.regression
            .iter()
            .enumerate()
            .filter_map(|(index, offsets)| offsets.map(|_| index))
    }

    pub fn num_positives(&self) -> usize {
        self.positive_indices().count()
    }

    pub fn positive_mask(&self) -> Array1<bool> {
        self.regression
            .iter()
            .map(|offsets| offsets.is_some())
            .collect()
    }

    /// Regression targets as a `(boxes, 4)` matrix with zero rows for background.
    pub fn regression_array(&self) -> Array2<f32> {
        let mut array = Array2::zeros((self.len(), 4));
        izip!(array.outer_iter_mut(), &self.regression).for_each(|(mut row, offsets)| {
            if let Some(offsets) = offsets {
                izip!(row.iter_mut(), offsets).for_each(|(dst, &src)| *dst = src);
            }
        });
        array
    }

    /// Classification targets as a `(boxes, class_nums)` one-hot matrix.
    /// Background rows are all zero when there is no background logit.
    pub fn one_hot_classes(&self) -> Array2<f32> {
        let mut array = Array2::zeros((self.len(), self.class_space.class_nums()));
        izip!(array.outer_iter_mut(), &self.logits).for_each(|(mut row, logit)| {
            if let Some(logit) = *logit {
                row[logit] = 1.0;
            }
        });
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        class::ClassLayout,
        dbox::{DefaultBoxInit, FeatureMapConfig},
        matching::BoxMatcherInit,
    };
    use approx::assert_abs_diff_eq;

    fn class_space() -> ClassSpace {
        ClassSpace::new(4, ClassLayout::WithBackground).unwrap()
    }

    fn codec() -> Codec {
        CodecInit::new(class_space()).build().unwrap()
    }

    fn dboxes() -> DefaultBoxes {
        DefaultBoxInit {
            feature_maps: vec![FeatureMapConfig {
                name: "map".into(),
                size: [4, 4],
                aspect_ratios: vec![r64(1.0), r64(2.0), r64(0.5)],
            }],
            scales: vec![r64(0.3), r64(0.6)],
            extra_square: true,
        }
        .build()
        .unwrap()
    }

    #[test]
    fn encode_decode_round_trip() {
        let codec = codec();
        let dbox_cases = [
            CxCyWH::from_cxcywh([0.5f32, 0.5, 0.2, 0.2]),
            CxCyWH::from_cxcywh([0.1f32, 0.9, 0.6, 0.05]),
            CxCyWH::from_cxcywh([0.95f32, 0.05, 0.3, 0.3]),
        ];
        let gt_cases = [
            XYXY::from_xyxy([0.1f32, 0.2, 0.4, 0.8]),
            XYXY::from_xyxy([0.0f32, 0.0, 1.0, 1.0]),
            XYXY::from_xyxy([0.7f32, 0.1, 0.72, 0.15]),
        ];

        for dbox in &dbox_cases {
            for gt in &gt_cases {
                let offsets = codec.encode(&gt.to_cxcywh(), dbox);
                let decoded = codec.decode(offsets, dbox);
                for (lhs, rhs) in gt.xyxy().into_iter().zip(decoded.xyxy()) {
                    assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn encode_formula() {
        let codec = codec();
        let dbox = CxCyWH::from_cxcywh([0.5f32, 0.5, 0.2, 0.4]);
        let gt = CxCyWH::from_cxcywh([0.52f32, 0.46, 0.4, 0.4]);
        let [tx, ty, tw, th] = codec.encode(&gt, &dbox);
        assert_abs_diff_eq!(tx, 0.02 / 0.2 / 0.1, epsilon = 1e-4);
        assert_abs_diff_eq!(ty, -0.04 / 0.4 / 0.1, epsilon = 1e-4);
        assert_abs_diff_eq!(tw, 2f32.ln() / 0.2, epsilon = 1e-4);
        assert_abs_diff_eq!(th, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn decode_clamps_into_unit_square() {
        let codec = codec();
        let dbox = CxCyWH::from_cxcywh([0.9f32, 0.1, 0.4, 0.4]);
        let decoded = codec.decode([0.0, 0.0, 0.0, 0.0], &dbox);
        assert_eq!(decoded.x_max(), 1.0);
        assert_eq!(decoded.y_min(), 0.0);
        assert!(decoded.x_min() >= 0.0 && decoded.y_max() <= 1.0);
    }

    #[test]
    fn decode_guards_against_overflow() {
        let codec = codec();
        let dbox = CxCyWH::from_cxcywh([0.5f32, 0.5, 0.1, 0.1]);

        let decoded = codec.decode_unclamped([0.0, 0.0, 1e6, f32::MAX], &dbox);
        assert!(decoded.w().is_finite() && decoded.h().is_finite());
        assert_abs_diff_eq!(decoded.w(), 0.1 * 1000.0 / 16.0, epsilon = 1e-3);

        let decoded = codec.decode([f32::NAN, 0.0, f32::NAN, -1e6], &dbox);
        assert!(decoded.xyxy().iter().all(|value| value.is_finite()));

        // NaN size offsets collapse instead of spanning the image
        let decoded = codec.decode_unclamped([0.0, 0.0, f32::NAN, f32::NAN], &dbox);
        assert_eq!(decoded.w(), 0.0);
        assert_eq!(decoded.h(), 0.0);
        assert_eq!(decoded.cx(), 0.5);

        let decoded = codec.decode([0.0, 0.0, f32::NAN, f32::NAN], &dbox);
        assert!(decoded.is_degenerate());
        assert_abs_diff_eq!(decoded.area(), 0.0);
    }

    #[test]
    fn targets_follow_matching() {
        let codec = codec();
        let dboxes = dboxes();
        let matcher = BoxMatcherInit::default().build().unwrap();
        let gts = vec![
            Label {
                rect: XYXY::from_xyxy([0.0f32, 0.0, 0.3, 0.3]),
                class: 2usize,
            },
            Label {
                rect: XYXY::from_xyxy([0.55f32, 0.55, 0.95, 0.95]),
                class: 0usize,
            },
        ];
        let rects: Vec<_> = gts.iter().map(|gt| gt.rect).collect();
        let matching = matcher.match_boxes(&dboxes, &rects).unwrap();
        let targets = codec.encode_targets(&dboxes, &matching, &gts).unwrap();

        assert_eq!(targets.len(), dboxes.len());
        assert_eq!(targets.num_positives(), matching.num_positives());

        let one_hot = targets.one_hot_classes();
        for (index, entry) in matching.entries().iter().enumerate() {
            match entry.ground_truth {
                Some(gt_index) => {
                    let class = gts[gt_index].class;
                    assert_eq!(targets.classes()[index], ClassTarget::Object(class));
                    assert_eq!(targets.logits()[index], Some(class + 1));
                    assert_eq!(one_hot[[index, class + 1]], 1.0);
                    assert!(targets.regression()[index].is_some());
                }
                None => {
                    assert_eq!(targets.classes()[index], ClassTarget::Background);
                    assert_eq!(targets.logits()[index], Some(0));
                    assert_eq!(one_hot[[index, 0]], 1.0);
                    assert!(targets.regression()[index].is_none());
                }
            }
            assert_abs_diff_eq!(one_hot.row(index).sum(), 1.0);
        }

        // regression targets decode back onto their ground truths
        let decoded = codec.decode_targets(&dboxes, &targets).unwrap();
        for (entry, decoded) in izip!(matching.entries(), &decoded) {
            if let Some(gt_index) = entry.ground_truth {
                let decoded = decoded.unwrap();
                for (lhs, rhs) in gts[gt_index].rect.xyxy().into_iter().zip(decoded.xyxy()) {
                    assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-5);
                }
            }
        }

        let dense = targets.regression_array();
        for index in 0..targets.len() {
            if !targets.positive_mask()[index] {
                assert!(dense.row(index).iter().all(|&value| value == 0.0));
            }
        }
    }

    #[test]
    fn no_ground_truth_yields_no_regression() {
        let codec = codec();
        let dboxes = dboxes();
        let matching = BoxMatcherInit::default()
            .build()
            .unwrap()
            .match_boxes(&dboxes, &[])
            .unwrap();
        let targets = codec.encode_targets(&dboxes, &matching, &[]).unwrap();

        assert_eq!(targets.num_positives(), 0);
        assert!(targets
            .classes()
            .iter()
            .all(|class| class.is_background()));
    }

    #[test]
    fn reject_mismatched_variance() {
        let dboxes = dboxes();
        let matching = BoxMatcherInit::default()
            .build()
            .unwrap()
            .match_boxes(&dboxes, &[])
            .unwrap();
        let targets = codec().encode_targets(&dboxes, &matching, &[]).unwrap();

        let other = CodecInit {
            variance_size: r64(0.1),
            ..CodecInit::new(class_space())
        }
        .build()
        .unwrap();
        assert!(other.decode_targets(&dboxes, &targets).is_err());
    }

    #[test]
    fn reject_out_of_range_label() {
        let codec = codec();
        let dboxes = dboxes();
        let gts = vec![Label {
            rect: XYXY::from_xyxy([0.0f32, 0.0, 0.3, 0.3]),
            class: 3usize,
        }];
        let matching = BoxMatcherInit::default()
            .build()
            .unwrap()
            .match_boxes(&dboxes, &[gts[0].rect])
            .unwrap();
        assert!(codec.encode_targets(&dboxes, &matching, &gts).is_err());
    }

    #[test]
    fn reject_invalid_variance() {
        let init = CodecInit {
            variance_center: r64(0.0),
            ..CodecInit::new(class_space())
        };
        assert!(init.build().is_err());
    }
}
