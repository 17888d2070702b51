//! Ground truth items collected over a batch of images.

use crate::common::*;

/// A ground truth box with an object label, in normalized corner form.
pub type GroundTruthLabel = Label<XYXY<f32>, usize>;

/// A ground truth box tagged with the image it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub image_index: usize,
    pub label: GroundTruthLabel,
}

/// The flat ground truth list of a batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroundTruthBatch {
    items: Vec<GroundTruth>,
}

impl GroundTruthBatch {
    /// Tag the labels of each image with its position in the batch.
    pub fn from_images<I, L>(images: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = GroundTruthLabel>,
    {
        let items = images
            .into_iter()
            .enumerate()
            .flat_map(|(image_index, labels)| {
                labels
                    .into_iter()
                    .map(move |label| GroundTruth { image_index, label })
            })
            .collect();
        Self { items }
    }

    pub fn push(&mut self, item: GroundTruth) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[GroundTruth] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Split the items back into per-image label lists, keeping their order.
    ///
    /// Images without ground truth get an empty list.
    pub fn per_image(&self, batch_size: usize) -> Result<Vec<Vec<GroundTruthLabel>>> {
        let mut images = vec![vec![]; batch_size];
        for item in &self.items {
            let GroundTruth { image_index, label } = item;
            ensure!(
                *image_index < batch_size,
                "ground truth refers to image {}, but the batch has {} images",
                image_index,
                batch_size
            );
            images[*image_index].push(label.clone());
        }
        Ok(images)
    }

    /// Parse rows of `[image_index, xmin, ymin, xmax, ymax, class]`.
    pub fn from_array(array: ArrayView2<f32>) -> Result<Self> {
        ensure!(
            array.ncols() == 6,
            "expect 6 columns per ground truth, but get {}",
            array.ncols()
        );

        array
            .outer_iter()
            .enumerate()
            .map(|(row_index, row)| -> Result<_> {
                let image_index = to_index(row[0])
                    .with_context(|| format!("invalid image index at row {}", row_index))?;
                let class = to_index(row[5])
                    .with_context(|| format!("invalid class label at row {}", row_index))?;
                let rect: XYXY<f32> = XYXY_ {
                    x_min: row[1],
                    y_min: row[2],
                    x_max: row[3],
                    y_max: row[4],
                }
                .try_into()
                .with_context(|| format!("invalid box at row {}", row_index))?;

                Ok(GroundTruth {
                    image_index,
                    label: Label { rect, class },
                })
            })
            .collect()
    }

    /// Rows of `[image_index, xmin, ymin, xmax, ymax, class]`.
    pub fn to_array(&self) -> Array2<f32> {
        let mut array = Array2::zeros((self.items.len(), 6));
        izip!(array.outer_iter_mut(), &self.items).for_each(|(mut row, item)| {
            let GroundTruth { image_index, label } = item;
            let [x_min, y_min, x_max, y_max] = label.rect.xyxy();
            row.assign(&Array1::from(vec![
                *image_index as f32,
                x_min,
                y_min,
                x_max,
                y_max,
                label.class as f32,
            ]));
        });
        array
    }
}

fn to_index(value: f32) -> Result<usize> {
    ensure!(
        value >= 0.0 && value.fract() == 0.0,
        "expect a non-negative integer, but get {}",
        value
    );
    Ok(value as usize)
}

impl FromIterator<GroundTruth> for GroundTruthBatch {
    fn from_iter<T: IntoIterator<Item = GroundTruth>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
