/// Per-class affine correction of raw logits before the sigmoid.
///
/// `Platt` holds one `(scale, bias)` pair per class, index-aligned with the
/// class list. `Identity` leaves the logits untouched, so probabilities are the
/// plain sigmoid of the model output.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    Identity,
    Platt { scale: Vec<f32>, bias: Vec<f32> },
}

impl Calibration {
    /// Builds Platt parameters, checking that both vectors have the same length.
    pub fn platt(scale: Vec<f32>, bias: Vec<f32>) -> Option<Self> {
        if scale.len() != bias.len() {
            return None;
        }
        Some(Self::Platt { scale, bias })
    }

    /// Short name shown in logs and in the model summary.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Identity => "none",
            Self::Platt { .. } => "platt",
        }
    }

    /// Number of classes the parameters cover, `None` for `Identity`.
    pub fn num_classes(&self) -> Option<usize> {
        match self {
            Self::Identity => None,
            Self::Platt { scale, .. } => Some(scale.len()),
        }
    }

    /// Applies the affine transform and the logistic sigmoid to every class.
    ///
    /// The caller guarantees `logits.len()` equals the number of classes.
    pub fn probabilities(&self, logits: &[f32]) -> Vec<f32> {
        match self {
            Self::Identity => logits.iter().map(|&z| sigmoid(z)).collect(),
            Self::Platt { scale, bias } => logits
                .iter()
                .zip(scale.iter().zip(bias.iter()))
                .map(|(&z, (&a, &b))| sigmoid(z * a + b))
                .collect(),
        }
    }
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
