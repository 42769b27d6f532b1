use ort::Error as OrtError;
use std::fmt;

use crate::config::ConfigError;

/// Represents the different types of errors that can occur in the emotion classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// Error occurred while loading or using the tokenizer
    TokenizerError(String),
    /// Error occurred while loading or running the ONNX model
    ModelError(String),
    /// Error occurred during the build phase
    BuildError(String),
    /// Error occurred while turning model output into a prediction
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
    /// The label configuration could not be loaded or does not fit the model
    ConfigError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenizerError(msg) => write!(f, "Tokenizer error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::BuildError(err.to_string())
    }
}

impl From<ConfigError> for ClassifierError {
    fn from(err: ConfigError) -> Self {
        ClassifierError::ConfigError(err.to_string())
    }
}

impl ClassifierError {
    /// True for failures of the tokenizer or the forward pass, as opposed to
    /// construction or configuration problems.
    pub fn is_inference_failure(&self) -> bool {
        matches!(
            self,
            Self::TokenizerError(_) | Self::ModelError(_) | Self::PredictionError(_)
        )
    }
}
