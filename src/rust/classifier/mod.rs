use serde::Serialize;

mod error;
mod calibration;
mod decision;
mod encoding;
mod model;
pub mod builder;

pub use error::ClassifierError;
pub use calibration::Calibration;
pub use decision::decide;
pub use model::{Classifier, EmotionPredictor};
pub use builder::ClassifierBuilder;

/// Default token budget per input, matching what the classifier was fine-tuned with.
pub const DEFAULT_MAX_LENGTH: usize = 128;
/// Longest input a BERT-style position embedding table accepts.
pub const MAX_SEQUENCE_LENGTH: usize = 512;
/// Default number of classes reported when none clears its threshold.
pub const DEFAULT_TOP_K_FALLBACK: usize = 3;

/// A reported emotion with its calibrated probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub label: String,
    pub probability: f32,
}

/// Result of a single prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Emotions that cleared their threshold, in class order; or, when none
    /// did, the top-K fallback in descending probability.
    pub selected: Vec<LabelScore>,
    /// Calibrated probability for every class, index-aligned with the class list.
    pub probabilities: Vec<f32>,
    /// Whether `selected` came from the top-K fallback.
    pub fallback: bool,
}

/// Per-call knobs for [`EmotionPredictor::predict_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictOptions {
    /// Inputs are truncated to, and padded up to, this many tokens.
    pub max_length: usize,
    /// How many classes to report when none clears its threshold. Zero disables the fallback.
    pub top_k_fallback: usize,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            top_k_fallback: DEFAULT_TOP_K_FALLBACK,
        }
    }
}

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierInfo {
    /// Path to the ONNX model file
    pub model_path: String,
    /// Path to the tokenizer file
    pub tokenizer_path: String,
    /// Number of emotion classes
    pub num_classes: usize,
    /// Labels of the classes, in class-index order
    pub class_labels: Vec<String>,
    /// Per-class thresholds, index-aligned with `class_labels`
    pub thresholds: Vec<f64>,
    /// Mean of `thresholds`
    pub mean_threshold: f64,
    /// Name of the calibration applied to logits
    pub calibration: String,
    /// Token budget used when no other is requested
    pub max_length: usize,
}
