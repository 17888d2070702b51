//! The assembled SSD box pipeline.

use crate::{
    activation::ClassActivation,
    class::{ClassLayout, ClassSpace},
    codec::{Codec, CodecInit, TrainingTargets},
    common::*,
    config::{CodecConfig, InferenceConfig, MatcherConfig},
    dbox::{DefaultBoxInit, DefaultBoxes},
    ground_truth::{GroundTruthBatch, GroundTruthLabel},
    image::{ImagePreprocessor, InputShape, Normalization, PreparedImages},
    inference::{Detection, InferenceBox, InferenceBoxInit},
    matching::{BoxMatcher, BoxMatcherInit},
    predictor::{PredictionMap, PredictionReshaper, RawPrediction},
};

#[derive(Debug, Clone)]
pub struct SsdModelInit {
    pub input_shape: InputShape,
    pub class_nums: usize,
    pub class_layout: ClassLayout,
    pub activation: ClassActivation,
    pub default_boxes: DefaultBoxInit,
    pub codec: CodecConfig,
    pub matcher: MatcherConfig,
    pub inference: InferenceConfig,
    pub normalization: Normalization,
}

impl SsdModelInit {
    pub fn build(self) -> Result<SsdModel> {
        let Self {
            input_shape,
            class_nums,
            class_layout,
            activation,
            default_boxes,
            codec,
            matcher,
            inference,
            normalization,
        } = self;

        let preprocessor = ImagePreprocessor::new(input_shape, &normalization)
            .context("invalid input configuration")?;
        let class_space = ClassSpace::new(class_nums, class_layout)?;
        let dboxes = default_boxes
            .build()
            .context("invalid default box configuration")?;
        let reshaper = PredictionReshaper::new(dboxes.layout().clone(), class_nums)?;
        let matcher = {
            let MatcherConfig { iou_threshold } = matcher;
            BoxMatcherInit { iou_threshold }
                .build()
                .context("invalid matcher configuration")?
        };
        let codec = {
            let CodecConfig {
                variance_center,
                variance_size,
                decode_clip,
            } = codec;
            CodecInit {
                variance_center,
                variance_size,
                decode_clip,
                class_space,
            }
            .build()
            .context("invalid codec configuration")?
        };
        let inference_box = {
            let InferenceConfig {
                conf_threshold,
                nms_iou_threshold,
                top_k,
                keep_per_class,
            } = inference;
            InferenceBoxInit {
                conf_threshold,
                nms_iou_threshold,
                top_k,
                keep_per_class,
                class_space,
            }
            .build()
            .context("invalid inference configuration")?
        };

        info!(
            "built SSD model with {} default boxes over {} feature maps and {} classes",
            dboxes.len(),
            dboxes.layout().num_maps(),
            class_nums
        );

        Ok(SsdModel {
            input_shape,
            class_space,
            activation,
            dboxes,
            reshaper,
            matcher,
            codec,
            inference_box,
            preprocessor,
        })
    }
}

/// A fully built pipeline. Every component shares the same default box grid.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct SsdModel {
    #[get_copy = "pub"]
    input_shape: InputShape,
    #[get_copy = "pub"]
    class_space: ClassSpace,
    #[get_copy = "pub"]
    activation: ClassActivation,
    #[get = "pub"]
    dboxes: DefaultBoxes,
    #[get = "pub"]
    reshaper: PredictionReshaper,
    #[get = "pub"]
    matcher: BoxMatcher,
    #[get = "pub"]
    codec: Codec,
    #[get = "pub"]
    inference_box: InferenceBox,
    #[get = "pub"]
    preprocessor: ImagePreprocessor,
}

impl SsdModel {
    /// Validate and optionally normalize a `(batch, height, width, channels)` batch.
    pub fn prepare_images(&self, images: ArrayView4<f32>, to_norm: bool) -> Result<PreparedImages> {
        self.preprocessor.prepare_batch(images, to_norm)
    }

    /// Flatten network outputs into per-image predictions in default box order.
    pub fn reshape(&self, maps: &[PredictionMap<'_>]) -> Result<Vec<RawPrediction>> {
        self.reshaper.reshape(maps)
    }

    /// Build the training targets of one image.
    ///
    /// Degenerate ground truth boxes are dropped with a warning.
    pub fn encode_targets(&self, ground_truths: &[GroundTruthLabel]) -> Result<TrainingTargets> {
        let ground_truths: Vec<_> = ground_truths
            .iter()
            .filter(|gt| {
                let keep = !gt.is_degenerate();
                if !keep {
                    warn!("drop degenerate ground truth box {:?}", gt.rect.xyxy());
                }
                keep
            })
            .cloned()
            .collect();
        let rects: Vec<_> = ground_truths.iter().map(|gt| gt.rect).collect();

        let matching = self.matcher.match_boxes(&self.dboxes, &rects)?;
        debug!(
            "matched {} ground truths to {} default boxes",
            rects.len(),
            matching.num_positives()
        );
        self.codec
            .encode_targets(&self.dboxes, &matching, &ground_truths)
    }

    /// Build the training targets of a batch, one entry per image.
    pub fn batch_targets(
        &self,
        ground_truths: &GroundTruthBatch,
        batch_size: usize,
    ) -> Result<Vec<TrainingTargets>> {
        let per_image = ground_truths.per_image(batch_size)?;
        per_image
            .par_iter()
            .enumerate()
            .map(|(image_index, ground_truths)| {
                self.encode_targets(ground_truths)
                    .with_context(|| format!("unable to build targets of image {}", image_index))
            })
            .collect()
    }

    /// Decode every default box of one image without filtering.
    pub fn decode(&self, prediction: &RawPrediction) -> Result<Vec<XYXY<f32>>> {
        self.codec.decode_all(&self.dboxes, prediction.loc().view())
    }

    /// Activate, decode and post-process the predictions of one image.
    pub fn detect(&self, prediction: &RawPrediction) -> Result<Vec<Detection>> {
        let boxes = self.decode(prediction)?;
        let scores = self.activation.apply(prediction.conf().view());
        self.inference_box.forward(&boxes, scores.view())
    }

    /// Run post-processing on a batch of network outputs, one detection list per image.
    pub fn infer(&self, maps: &[PredictionMap<'_>]) -> Result<Vec<Vec<Detection>>> {
        let predictions = self.reshape(maps)?;
        predictions
            .par_iter()
            .map(|prediction| self.detect(prediction))
            .collect()
    }

    /// The transform from normalized coordinates to input pixels.
    pub fn pixel_transform(&self) -> Result<Transform<f32>> {
        Transform::try_from_unit_to(&self.input_shape.size()?)
    }

    /// Map normalized detections into input pixel coordinates.
    pub fn to_pixels(&self, detections: &[Detection]) -> Result<Vec<Detection>> {
        let transform = self.pixel_transform()?;
        Ok(detections
            .iter()
            .map(|detection| &transform * detection)
            .collect())
    }
}
