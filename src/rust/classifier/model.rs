use std::sync::Arc;
use std::time::Instant;

use log::debug;
use ort::session::Session;
use tokenizers::Tokenizer;

use super::decision::decide;
use super::encoding::SequenceScoring;
use super::error::ClassifierError;
use super::{ClassifierInfo, PredictOptions, Prediction};
use crate::config::LabelConfig;

/// Anything that can turn text into an emotion [`Prediction`].
///
/// The web layer only talks to this trait, so it can be driven by a stub in
/// tests and by [`Classifier`] in production.
pub trait EmotionPredictor: Send + Sync {
    /// Predicts the emotions in `text` with explicit options.
    fn predict_with(&self, text: &str, options: &PredictOptions) -> Result<Prediction, ClassifierError>;

    /// Describes the loaded model and label configuration.
    fn info(&self) -> ClassifierInfo;

    /// Options used when the caller does not choose any.
    fn default_options(&self) -> PredictOptions {
        PredictOptions::default()
    }

    /// Predicts with [`EmotionPredictor::default_options`].
    fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        self.predict_with(text, &self.default_options())
    }
}

/// A thread-safe multilabel emotion classifier backed by an ONNX sequence
/// classification model.
///
/// # Thread Safety
///
/// This type is automatically `Send + Sync`: the tokenizer, session and label
/// configuration are immutable after [`build`](super::ClassifierBuilder::build)
/// and shared through `Arc`.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use moodlens::{Classifier, ConfigPaths, EmotionPredictor};
///
/// let classifier = Classifier::builder()
///     .with_model_dir("models/bert_base_cb_loss_final")?
///     .with_config_paths(&ConfigPaths::in_dir("configs"))?
///     .build()?;
///
/// let prediction = classifier.predict("I can't believe we actually won!")?;
/// for emotion in &prediction.selected {
///     println!("{}: {:.3}", emotion.label, emotion.probability);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Classifier {
    pub model_path: String,
    pub tokenizer_path: String,
    pub tokenizer: Arc<Tokenizer>,
    pub session: Arc<Session>,
    pub labels: Arc<LabelConfig>,
    pub max_length: usize,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl SequenceScoring for Classifier {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        Some(&self.tokenizer)
    }

    fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }

    fn configured_max_length(&self) -> usize {
        self.max_length
    }
}

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Number of tokens `text` occupies before padding, including special tokens.
    pub fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        self.real_token_count(text)
    }
}

impl EmotionPredictor for Classifier {
    fn predict_with(&self, text: &str, options: &PredictOptions) -> Result<Prediction, ClassifierError> {
        let start = Instant::now();
        let logits = self.score_text(text, options.max_length)?;
        let prediction = decide(&logits, &self.labels, options.top_k_fallback)?;
        debug!(
            "Predicted {} emotion(s){} in {:.2?}",
            prediction.selected.len(),
            if prediction.fallback { " via top-k fallback" } else { "" },
            start.elapsed()
        );
        Ok(prediction)
    }

    fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self.model_path.clone(),
            tokenizer_path: self.tokenizer_path.clone(),
            num_classes: self.labels.num_classes(),
            class_labels: self.labels.classes().as_slice().to_vec(),
            thresholds: self.labels.thresholds().as_slice().to_vec(),
            mean_threshold: self.labels.thresholds().mean(),
            calibration: self.labels.calibration().mode_name().to_string(),
            max_length: self.max_length,
        }
    }

    fn default_options(&self) -> PredictOptions {
        PredictOptions {
            max_length: self.max_length,
            ..PredictOptions::default()
        }
    }
}
