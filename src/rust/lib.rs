//! A multilabel emotion classifier built on ONNX sequence-classification models,
//! with per-class Platt calibration, per-class thresholds and a small web front end.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use moodlens::{Classifier, ConfigPaths, EmotionPredictor, PredictOptions};
//!
//! let classifier = Classifier::builder()
//!     .with_model_dir("models/bert_base_cb_loss_final")?
//!     .with_config_paths(&ConfigPaths::in_dir("configs"))?
//!     .build()?;
//!
//! let prediction = classifier.predict_with(
//!     "Honestly I did not expect the ending, it made me cry",
//!     &PredictOptions { top_k_fallback: 2, ..PredictOptions::default() },
//! )?;
//! for emotion in &prediction.selected {
//!     println!("{}: {:.3}", emotion.label, emotion.probability);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! ```no_run
//! # async fn run(classifier: moodlens::Classifier) -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use moodlens::web::{self, AppState};
//!
//! let state = AppState::new(Arc::new(classifier))?;
//! web::serve(state, "127.0.0.1:8501").await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
mod runtime;
pub mod model_manager;
pub mod web;

pub use classifier::{
    decide, Calibration, Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, EmotionPredictor,
    LabelScore, PredictOptions, Prediction, DEFAULT_MAX_LENGTH, DEFAULT_TOP_K_FALLBACK, MAX_SEQUENCE_LENGTH,
};
pub use config::{ClassList, ConfigError, ConfigPaths, LabelConfig, Thresholds};
pub use runtime::{RuntimeConfig, create_session_builder};
pub use model_manager::{ArtifactManifest, ModelError, ModelStore};

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
