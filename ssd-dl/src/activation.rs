use crate::common::*;

/// The activation turning raw class logits into scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassActivation {
    Softmax,
    Sigmoid,
    /// The logits are already scores.
    Identity,
}

impl Default for ClassActivation {
    fn default() -> Self {
        Self::Softmax
    }
}

impl ClassActivation {
    /// Activate a `(boxes, classes)` logit matrix row by row.
    pub fn apply(&self, logits: ArrayView2<f32>) -> Array2<f32> {
        match self {
            Self::Softmax => {
                let mut scores = logits.to_owned();
                scores.axis_iter_mut(Axis(0)).for_each(|mut row| {
                    let max = row.fold(f32::NEG_INFINITY, |max, &value| max.max(value));
                    row.mapv_inplace(|value| (value - max).exp());
                    let sum = row.sum();
                    row.mapv_inplace(|value| value / sum);
                });
                scores
            }
            Self::Sigmoid => logits.mapv(|value| 1.0 / (1.0 + (-value).exp())),
            Self::Identity => logits.to_owned(),
        }
    }
}
