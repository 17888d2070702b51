use anyhow::Result;
use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array4};
use ssd_dl::{
    bbox::{prelude::*, XYXY},
    codec::TrainingTargets,
    config::Config,
    ground_truth::{GroundTruthBatch, GroundTruthLabel},
    label::Label,
    model::SsdModel,
    predictor::PredictionMap,
};
use std::path::{Path, PathBuf};

lazy_static::lazy_static! {
    static ref CONFIG_DIR: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cfg");
}

fn toy_model() -> Result<SsdModel> {
    Config::open(CONFIG_DIR.join("toy.json5"))?.model_init().build()
}

fn gt(xyxy: [f32; 4], class: usize) -> GroundTruthLabel {
    Label {
        rect: XYXY::from_xyxy(xyxy),
        class,
    }
}

/// Network outputs that reproduce the training targets exactly.
fn perfect_outputs(model: &SsdModel, targets: &[TrainingTargets]) -> Vec<(Array4<f32>, Array4<f32>)> {
    let class_nums = model.class_space().class_nums();
    let batch_size = targets.len();
    let regressions: Vec<Array2<f32>> = targets.iter().map(|t| t.regression_array()).collect();
    let one_hots: Vec<Array2<f32>> = targets.iter().map(|t| t.one_hot_classes()).collect();

    model
        .dboxes()
        .layout()
        .maps()
        .iter()
        .map(|map| {
            let (h, w, variants) = (map.h(), map.w(), map.variants());
            let loc = Array4::from_shape_fn((batch_size, variants * 4, h, w), |(b, c, row, col)| {
                regressions[b][[map.flat_index(row, col, c / 4), c % 4]]
            });
            let conf = Array4::from_shape_fn(
                (batch_size, variants * class_nums, h, w),
                |(b, c, row, col)| {
                    let flat = map.flat_index(row, col, c / class_nums);
                    one_hots[b][[flat, c % class_nums]] * 10.0
                },
            );
            (loc, conf)
        })
        .collect()
}

#[test]
fn targets_round_trip_through_inference() -> Result<()> {
    let model = toy_model()?;
    assert_eq!(model.dboxes().len(), 4 * 4 * 4 + 2 * 2 * 2);

    let images = vec![
        vec![gt([0.05, 0.05, 0.3, 0.35], 0), gt([0.5, 0.4, 0.95, 0.9], 1)],
        vec![],
        vec![gt([0.2, 0.2, 0.6, 0.6], 1)],
    ];
    let batch = GroundTruthBatch::from_images(images.clone());
    let targets = model.batch_targets(&batch, images.len())?;
    assert_eq!(targets.len(), images.len());
    assert_eq!(targets[1].num_positives(), 0);

    let outputs = perfect_outputs(&model, &targets);
    let maps: Vec<_> = outputs
        .iter()
        .map(|(loc, conf)| PredictionMap {
            loc: loc.view(),
            conf: conf.view(),
        })
        .collect();
    let detections = model.infer(&maps)?;
    assert_eq!(detections.len(), images.len());

    for (gts, detections) in images.iter().zip(&detections) {
        // duplicates of one ground truth decode to the same box and are suppressed
        assert_eq!(detections.len(), gts.len());

        for gt in gts {
            let detection = detections
                .iter()
                .find(|det| det.class == gt.class)
                .expect("missing detection");
            assert!(detection.score > 0.99);
            for (lhs, rhs) in gt.rect.xyxy().into_iter().zip(detection.rect.xyxy()) {
                assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-4);
            }
        }
    }

    Ok(())
}

#[test]
fn unfiltered_decode_covers_every_default_box() -> Result<()> {
    let model = toy_model()?;
    let num_boxes = model.dboxes().len();
    let layout = model.dboxes().layout();
    let class_nums = model.class_space().class_nums();

    let outputs: Vec<_> = layout
        .maps()
        .iter()
        .map(|map| {
            let loc = Array4::<f32>::zeros((1, map.variants() * 4, map.h(), map.w()));
            let conf = Array4::<f32>::zeros((1, map.variants() * class_nums, map.h(), map.w()));
            (loc, conf)
        })
        .collect();
    let maps: Vec<_> = outputs
        .iter()
        .map(|(loc, conf)| PredictionMap {
            loc: loc.view(),
            conf: conf.view(),
        })
        .collect();

    let predictions = model.reshape(&maps)?;
    let boxes = model.decode(&predictions[0])?;
    assert_eq!(boxes.len(), num_boxes);

    // zero offsets decode to the clamped default boxes
    for (decoded, dbox) in boxes.iter().zip(model.dboxes().boxes()) {
        let expect = dbox.clamp_unit();
        for (lhs, rhs) in decoded.xyxy().into_iter().zip(expect.xyxy()) {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-6);
        }
    }

    // uniform scores of 1/3 stay below the confidence threshold
    assert!(model.detect(&predictions[0])?.is_empty());
    Ok(())
}

#[test]
fn reject_mismatched_batch() -> Result<()> {
    let model = toy_model()?;
    let batch = GroundTruthBatch::from_images(vec![vec![], vec![gt([0.1, 0.1, 0.2, 0.2], 0)]]);
    assert!(model.batch_targets(&batch, 1).is_err());

    let images = Array4::<f32>::zeros((2, 64, 32, 3));
    assert!(model.prepare_images(images.view(), true).is_err());
    let images = Array4::<f32>::zeros((2, 64, 64, 3));
    assert_eq!(model.prepare_images(images.view(), true)?.normalized().dim(), (2, 64, 64, 3));
    Ok(())
}
