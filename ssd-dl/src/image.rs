//! Input image validation and normalization.

use crate::common::*;

/// The expected `(height, width, channels)` of input images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    pub fn check(&self) -> Result<()> {
        let Self {
            height,
            width,
            channels,
        } = *self;
        ensure!(
            height > 0 && width > 0 && channels > 0,
            "input shape must be non-empty, but get {:?}",
            [height, width, channels]
        );
        ensure!(
            height == width,
            "input must be square, but get {}x{}",
            height,
            width
        );
        Ok(())
    }

    pub fn hwc(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    /// The image size in pixels.
    pub fn size(&self) -> Result<HW<f32>> {
        HW_ {
            h: self.height as f32,
            w: self.width as f32,
        }
        .try_into()
    }
}

/// Per-channel statistics applied as `(pixel - mean) / std`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Normalization {
    pub means: Vec<R64>,
    pub stds: Vec<R64>,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            means: vec![r64(103.939), r64(116.779), r64(123.68)],
            stds: vec![r64(1.0), r64(1.0), r64(1.0)],
        }
    }
}

/// A batch of `(batch, height, width, channels)` images in both forms.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct PreparedImages {
    #[get = "pub"]
    normalized: Array4<f32>,
    #[get = "pub"]
    original: Array4<f32>,
}

impl PreparedImages {
    /// The normalized images in `(batch, channels, height, width)` order.
    pub fn channel_first(&self) -> Array4<f32> {
        self.normalized
            .view()
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned()
    }
}

#[derive(Debug, Clone, CopyGetters)]
pub struct ImagePreprocessor {
    #[get_copy = "pub"]
    input_shape: InputShape,
    means: Array1<f32>,
    stds: Array1<f32>,
}

impl ImagePreprocessor {
    pub fn new(input_shape: InputShape, normalization: &Normalization) -> Result<Self> {
        input_shape.check()?;
        let Normalization { means, stds } = normalization;
        ensure!(
            means.len() == input_shape.channels && stds.len() == input_shape.channels,
            "expect {} normalization means and stds, but get {} and {}",
            input_shape.channels,
            means.len(),
            stds.len()
        );
        ensure!(
            stds.iter().all(|std| *std > 0.0),
            "normalization stds must be positive, but get {:?}",
            stds
        );

        Ok(Self {
            input_shape,
            means: means.iter().map(|mean| mean.raw() as f32).collect(),
            stds: stds.iter().map(|std| std.raw() as f32).collect(),
        })
    }

    /// Validate and normalize a single `(height, width, channels)` image.
    pub fn prepare(&self, image: ArrayView3<f32>, to_norm: bool) -> Result<PreparedImages> {
        self.prepare_batch(image.insert_axis(Axis(0)), to_norm)
    }

    /// Validate a `(batch, height, width, channels)` batch.
    ///
    /// With `to_norm` the input is raw pixels and gets normalized. Otherwise
    /// the input is taken as normalized and the original is recovered.
    pub fn prepare_batch(&self, images: ArrayView4<f32>, to_norm: bool) -> Result<PreparedImages> {
        let expect = self.input_shape.hwc();
        ensure!(
            images.shape()[1..] == expect[..],
            "image shape was not same as input shape: {:?}, but get {:?}",
            expect,
            &images.shape()[1..]
        );

        let prepared = if to_norm {
            PreparedImages {
                normalized: (&images - &self.means) / &self.stds,
                original: images.to_owned(),
            }
        } else {
            PreparedImages {
                original: &images * &self.stds + &self.means,
                normalized: images.to_owned(),
            }
        };
        Ok(prepared)
    }
}
