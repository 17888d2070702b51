//! Flattening of per-feature-map network outputs into default box order.

use crate::{common::*, dbox::GridLayout};

/// The raw outputs of one feature map.
///
/// `loc` has shape `(batch, variants * 4, h, w)` and `conf` has shape
/// `(batch, variants * class_nums, h, w)`. Channel `variant * k + j`
/// holds component `j` of the given variant.
#[derive(Debug, Clone)]
pub struct PredictionMap<'a> {
    pub loc: ArrayView4<'a, f32>,
    pub conf: ArrayView4<'a, f32>,
}

/// The flattened raw predictions of one image, one row per default box.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct RawPrediction {
    /// `(boxes, 4)` location offsets.
    #[get = "pub"]
    loc: Array2<f32>,
    /// `(boxes, class_nums)` raw class scores.
    #[get = "pub"]
    conf: Array2<f32>,
}

impl RawPrediction {
    pub fn new(loc: Array2<f32>, conf: Array2<f32>) -> Result<Self> {
        ensure!(
            loc.ncols() == 4,
            "location predictions must have 4 columns, but get {}",
            loc.ncols()
        );
        ensure!(
            loc.nrows() == conf.nrows(),
            "location and confidence predictions disagree on box count: {} vs {}",
            loc.nrows(),
            conf.nrows()
        );
        Ok(Self { loc, conf })
    }

    pub fn num_boxes(&self) -> usize {
        self.loc.nrows()
    }
}

/// Reorders network outputs so row `i` belongs to default box `i`.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct PredictionReshaper {
    #[get = "pub"]
    layout: GridLayout,
    #[get_copy = "pub"]
    class_nums: usize,
}

impl PredictionReshaper {
    pub fn new(layout: GridLayout, class_nums: usize) -> Result<Self> {
        ensure!(class_nums > 0, "class_nums must be positive");
        Ok(Self { layout, class_nums })
    }

    /// Flatten a batch into `(batch, boxes, 4)` offsets and `(batch, boxes, class_nums)` scores.
    pub fn reshape_batch(&self, maps: &[PredictionMap<'_>]) -> Result<(Array3<f32>, Array3<f32>)> {
        ensure!(
            maps.len() == self.layout.num_maps(),
            "expect predictions of {} feature maps, but get {}",
            self.layout.num_maps(),
            maps.len()
        );
        let batch_size = maps[0].loc.shape()[0];
        let num_boxes = self.layout.num_boxes();
        let class_nums = self.class_nums;

        let mut loc = Array3::zeros((batch_size, num_boxes, 4));
        let mut conf = Array3::zeros((batch_size, num_boxes, class_nums));

        for (index, (map, map_layout)) in izip!(maps, self.layout.maps()).enumerate() {
            let (h, w, variants) = (map_layout.h(), map_layout.w(), map_layout.variants());
            let begin = map_layout.offset();
            let end = begin + map_layout.num_boxes();

            let map_loc = flatten_map(map.loc, batch_size, [h, w, variants], 4)
                .with_context(|| format!("invalid location predictions of feature map {}", index))?;
            let map_conf = flatten_map(map.conf, batch_size, [h, w, variants], class_nums)
                .with_context(|| {
                    format!("invalid confidence predictions of feature map {}", index)
                })?;

            loc.slice_mut(s![.., begin..end, ..]).assign(&map_loc);
            conf.slice_mut(s![.., begin..end, ..]).assign(&map_conf);
        }

        Ok((loc, conf))
    }

    /// Flatten a batch into one [RawPrediction] per image.
    pub fn reshape(&self, maps: &[PredictionMap<'_>]) -> Result<Vec<RawPrediction>> {
        let (loc, conf) = self.reshape_batch(maps)?;
        let predictions = izip!(loc.outer_iter(), conf.outer_iter())
            .map(|(loc, conf)| RawPrediction {
                loc: loc.to_owned(),
                conf: conf.to_owned(),
            })
            .collect();
        Ok(predictions)
    }
}

/// Permute `(batch, variants * k, h, w)` to channel-last and merge the
/// cell and variant axes into `(batch, h * w * variants, k)`.
fn flatten_map(
    tensor: ArrayView4<'_, f32>,
    batch_size: usize,
    [h, w, variants]: [usize; 3],
    k: usize,
) -> Result<Array3<f32>> {
    let expect = [batch_size, variants * k, h, w];
    ensure!(
        tensor.shape() == &expect[..],
        "expect shape {:?}, but get {:?}",
        expect,
        tensor.shape()
    );

    let flat = tensor
        .permuted_axes([0, 2, 3, 1])
        .as_standard_layout()
        .into_owned()
        .into_shape((batch_size, h * w * variants, k))?;
    Ok(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbox::{DefaultBoxInit, FeatureMapConfig, GridIndex};
    use ndarray::Array4;

    /// Fill a `(batch, channels, h, w)` tensor with `batch * 1000 + channel * 100 + row * 10 + col`.
    fn tagged(shape: [usize; 4]) -> Array4<f32> {
        Array4::from_shape_fn(shape, |(b, c, row, col)| {
            (b * 1000 + c * 100 + row * 10 + col) as f32
        })
    }

    #[test]
    fn toy_map_ordering() {
        let dboxes = DefaultBoxInit {
            feature_maps: vec![FeatureMapConfig {
                name: "toy".into(),
                size: [2, 2],
                aspect_ratios: vec![r64(1.0)],
            }],
            scales: vec![r64(0.4), r64(0.9)],
            extra_square: true,
        }
        .build()
        .unwrap();
        assert_eq!(dboxes.layout().maps()[0].variants(), 2);

        let class_nums = 3;
        let reshaper = PredictionReshaper::new(dboxes.layout().clone(), class_nums).unwrap();
        let loc = tagged([1, 2 * 4, 2, 2]);
        let conf = tagged([1, 2 * class_nums, 2, 2]);
        let predictions = reshaper
            .reshape(&[PredictionMap {
                loc: loc.view(),
                conf: conf.view(),
            }])
            .unwrap();
        assert_eq!(predictions.len(), 1);
        let prediction = &predictions[0];

        // cell (row 1, col 0), variant 1, computed from the iteration order
        let (row, col, variant) = (1, 0, 1);
        let flat = (row * 2 + col) * 2 + variant;
        assert_eq!(flat, 5);
        assert_eq!(
            dboxes.layout().flat_index(GridIndex {
                map: 0,
                row,
                col,
                variant
            }),
            Some(flat)
        );

        // the default box at that index sits at the cell and is the extra square
        let dbox = &dboxes.boxes()[flat];
        assert_eq!(dbox.cx(), 0.25);
        assert_eq!(dbox.cy(), 0.75);
        assert!(dbox.w() > 0.4);

        for j in 0..4 {
            let channel = variant * 4 + j;
            assert_eq!(
                prediction.loc()[[flat, j]],
                (channel * 100 + row * 10 + col) as f32
            );
        }
        for j in 0..class_nums {
            let channel = variant * class_nums + j;
            assert_eq!(
                prediction.conf()[[flat, j]],
                (channel * 100 + row * 10 + col) as f32
            );
        }
    }

    #[test]
    fn every_row_agrees_with_layout() {
        let layout = GridLayout::new([[2, 3, 2], [1, 2, 3]]).unwrap();
        let class_nums = 2;
        let reshaper = PredictionReshaper::new(layout.clone(), class_nums).unwrap();

        let batch_size = 2;
        let locs: Vec<_> = layout
            .maps()
            .iter()
            .map(|map| tagged([batch_size, map.variants() * 4, map.h(), map.w()]))
            .collect();
        let confs: Vec<_> = layout
            .maps()
            .iter()
            .map(|map| tagged([batch_size, map.variants() * class_nums, map.h(), map.w()]))
            .collect();
        let maps: Vec<_> = izip!(&locs, &confs)
            .map(|(loc, conf)| PredictionMap {
                loc: loc.view(),
                conf: conf.view(),
            })
            .collect();

        let (loc, conf) = reshaper.reshape_batch(&maps).unwrap();
        assert_eq!(loc.dim(), (batch_size, layout.num_boxes(), 4));
        assert_eq!(conf.dim(), (batch_size, layout.num_boxes(), class_nums));

        for b in 0..batch_size {
            for (flat, index) in layout.iter().enumerate() {
                let GridIndex {
                    map,
                    row,
                    col,
                    variant,
                } = index;
                for j in 0..4 {
                    assert_eq!(
                        loc[[b, flat, j]],
                        locs[map][[b, variant * 4 + j, row, col]]
                    );
                }
                for j in 0..class_nums {
                    assert_eq!(
                        conf[[b, flat, j]],
                        confs[map][[b, variant * class_nums + j, row, col]]
                    );
                }
            }
        }
    }

    #[test]
    fn reject_mismatched_shapes() {
        let layout = GridLayout::new([[2, 2, 2]]).unwrap();
        let reshaper = PredictionReshaper::new(layout, 3).unwrap();

        let loc = tagged([1, 8, 2, 2]);
        let bad_conf = tagged([1, 5, 2, 2]);
        assert!(reshaper
            .reshape(&[PredictionMap {
                loc: loc.view(),
                conf: bad_conf.view(),
            }])
            .is_err());

        let bad_loc = tagged([1, 8, 3, 2]);
        let conf = tagged([1, 6, 2, 2]);
        assert!(reshaper
            .reshape(&[PredictionMap {
                loc: bad_loc.view(),
                conf: conf.view(),
            }])
            .is_err());

        let other_batch = tagged([2, 6, 2, 2]);
        assert!(reshaper
            .reshape(&[PredictionMap {
                loc: loc.view(),
                conf: other_batch.view(),
            }])
            .is_err());

        assert!(reshaper.reshape(&[]).is_err());
    }
}
