use super::layout::{GridIndex, GridLayout};
use crate::common::*;

/// The default box configuration of one feature map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureMapConfig {
    /// The name of the layer the classifier reads from.
    pub name: String,
    /// The `[height, width]` of the feature map.
    pub size: [usize; 2],
    /// The aspect ratios (width over height) of the boxes in each cell, in emission order.
    pub aspect_ratios: Vec<R64>,
}

/// The default box generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefaultBoxInit {
    /// Feature maps in the order the network emits their predictions.
    pub feature_maps: Vec<FeatureMapConfig>,
    /// Box scales relative to the image. Entry `f` is the scale of feature
    /// map `f`, and entry `f + 1` defines its extra square box, so the list
    /// has one more entry than there are feature maps.
    pub scales: Vec<R64>,
    /// Emit a second square box of scale `sqrt(s_f * s_{f+1})` right after the ratio-1 box.
    #[serde(default = "default_extra_square")]
    pub extra_square: bool,
}

fn default_extra_square() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Variant {
    scale: f64,
    ratio: f64,
}

impl DefaultBoxInit {
    pub fn build(self) -> Result<DefaultBoxes> {
        let Self {
            feature_maps,
            scales,
            extra_square,
        } = self;

        ensure!(
            !feature_maps.is_empty(),
            "at least one feature map is required"
        );
        ensure!(
            scales.len() == feature_maps.len() + 1,
            "expect {} scales for {} feature maps, but get {}",
            feature_maps.len() + 1,
            feature_maps.len(),
            scales.len()
        );
        for (index, scale) in scales.iter().enumerate() {
            ensure!(
                scale.raw().is_finite() && *scale > 0.0,
                "scale {} must be positive and finite, but get {}",
                index,
                scale
            );
        }
        {
            let mut names = HashSet::new();
            for map in &feature_maps {
                ensure!(
                    names.insert(&map.name),
                    "duplicated feature map name '{}'",
                    map.name
                );
            }
        }

        // resolve the per-cell variants of each feature map
        let variants: Vec<Vec<Variant>> = feature_maps
            .iter()
            .enumerate()
            .map(|(index, map)| {
                let FeatureMapConfig {
                    ref name,
                    ref aspect_ratios,
                    ..
                } = *map;
                ensure!(
                    !aspect_ratios.is_empty(),
                    "feature map '{}' has no aspect ratios",
                    name
                );
                for (nth, ratio) in aspect_ratios.iter().enumerate() {
                    ensure!(
                        ratio.raw().is_finite() && *ratio > 0.0,
                        "aspect ratio of feature map '{}' must be positive and finite, but get {}",
                        name,
                        ratio
                    );
                    ensure!(
                        !aspect_ratios[..nth].contains(ratio),
                        "duplicated aspect ratio {} in feature map '{}'",
                        ratio,
                        name
                    );
                }
                ensure!(
                    !extra_square || aspect_ratios.iter().any(|ratio| *ratio == 1.0),
                    "feature map '{}' must list aspect ratio 1 when extra_square is enabled",
                    name
                );

                let scale = scales[index].raw();
                let next_scale = scales[index + 1].raw();
                let variants: Vec<_> = aspect_ratios
                    .iter()
                    .flat_map(|ratio| {
                        let ratio = ratio.raw();
                        let base = Variant { scale, ratio };
                        let extra = (extra_square && ratio == 1.0).then(|| Variant {
                            scale: (scale * next_scale).sqrt(),
                            ratio,
                        });
                        iter::once(base).chain(extra)
                    })
                    .collect();
                Ok(variants)
            })
            .collect::<Result<_>>()?;

        let layout = GridLayout::new(
            izip!(&feature_maps, &variants).map(|(map, variants)| {
                let [h, w] = map.size;
                [h, w, variants.len()]
            }),
        )?;

        let boxes: Vec<CxCyWH<f32>> = layout
            .iter()
            .map(|index| {
                let GridIndex {
                    map,
                    row,
                    col,
                    variant,
                } = index;
                let [h, w] = feature_maps[map].size;
                let Variant { scale, ratio } = variants[map][variant];

                let cx = (col as f64 + 0.5) / w as f64;
                let cy = (row as f64 + 0.5) / h as f64;
                let box_w = scale * ratio.sqrt();
                let box_h = scale / ratio.sqrt();

                CxCyWH::try_from_cxcywh([cx as f32, cy as f32, box_w as f32, box_h as f32])
            })
            .collect::<Result<_>>()?;
        let corners: Vec<XYXY<f32>> = boxes.iter().map(XYXY::from).collect();

        debug!(
            "generated {} default boxes over {} feature maps",
            boxes.len(),
            layout.num_maps()
        );

        Ok(DefaultBoxes {
            names: feature_maps.into_iter().map(|map| map.name).collect(),
            layout,
            boxes,
            corners,
        })
    }
}

/// The immutable default box grid.
///
/// Boxes are stored in the flat order defined by its [GridLayout]. Centers and
/// extents are not clamped, so boxes near the border may straddle the image edge.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct DefaultBoxes {
    #[get = "pub"]
    layout: GridLayout,
    /// Feature map names, in layout order.
    #[get = "pub"]
    names: Vec<String>,
    /// Boxes in center form.
    #[get = "pub"]
    boxes: Vec<CxCyWH<f32>>,
    /// The same boxes in corner form.
    #[get = "pub"]
    corners: Vec<XYXY<f32>>,
}

impl DefaultBoxes {
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
