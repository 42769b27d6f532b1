use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use ort::session::Session;
use tokenizers::Tokenizer;

use super::encoding::{configure_tokenizer, SequenceScoring};
use super::error::ClassifierError;
use super::model::Classifier;
use super::{DEFAULT_MAX_LENGTH, MAX_SEQUENCE_LENGTH};
use crate::config::{ConfigPaths, LabelConfig};
use crate::model_manager::{MODEL_FILE, TOKENIZER_FILE};
use crate::runtime::{create_session_builder, RuntimeConfig};

const PROBE_TEXT: &str = "Test input to check the classifier output size";

/// A builder for constructing a Classifier with a fluent interface.
#[derive(Debug)]
pub struct ClassifierBuilder {
    model_path: Option<String>,
    tokenizer_path: Option<String>,
    tokenizer: Option<Tokenizer>,
    session: Option<Session>,
    label_config: Option<LabelConfig>,
    max_length: usize,
    runtime_config: RuntimeConfig,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceScoring for ClassifierBuilder {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        self.tokenizer.as_ref()
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn configured_max_length(&self) -> usize {
        self.max_length
    }
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use moodlens::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            tokenizer: None,
            session: None,
            label_config: None,
            max_length: DEFAULT_MAX_LENGTH,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration for ONNX model execution.
    ///
    /// Must be called before the model is loaded to take effect.
    ///
    /// # Example
    /// ```
    /// use moodlens::{ClassifierBuilder, RuntimeConfig};
    ///
    /// let config = RuntimeConfig::default();
    /// let builder = ClassifierBuilder::new()
    ///     .with_runtime_config(config);
    /// ```
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets the default token budget used by `predict`.
    ///
    /// # Errors
    /// * `ValidationError` if `max_length` is zero or above [`MAX_SEQUENCE_LENGTH`]
    pub fn with_max_length(mut self, max_length: usize) -> Result<Self, ClassifierError> {
        if max_length == 0 || max_length > MAX_SEQUENCE_LENGTH {
            return Err(ClassifierError::ValidationError(format!(
                "max_length must be between 1 and {}, got {}",
                MAX_SEQUENCE_LENGTH, max_length
            )));
        }
        self.max_length = max_length;
        Ok(self)
    }

    /// Loads `model.onnx` and `tokenizer.json` from a model directory.
    ///
    /// # Example
    /// ```no_run
    /// use moodlens::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_model_dir("models/bert_base_cb_loss_final");
    /// ```
    pub fn with_model_dir(self, dir: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(ClassifierError::BuildError("Model directory cannot be empty".to_string()));
        }
        if !dir.is_dir() {
            return Err(ClassifierError::BuildError(format!("Model directory not found: {}", dir.display())));
        }
        let model_path = dir.join(MODEL_FILE);
        let tokenizer_path = dir.join(TOKENIZER_FILE);
        self.with_model_files(&model_path.to_string_lossy(), &tokenizer_path.to_string_lossy())
    }

    /// Sets explicit model and tokenizer files for the classifier
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - The model or tokenizer paths are empty
    ///   - The paths are already set
    ///   - The files don't exist
    ///   - The model or tokenizer failed to load
    ///   - The model structure is invalid
    pub fn with_model_files(mut self, model_path: &str, tokenizer_path: &str) -> Result<Self, ClassifierError> {
        if model_path.is_empty() || tokenizer_path.is_empty() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths cannot be empty".to_string()));
        }
        if self.model_path.is_some() || self.tokenizer_path.is_some() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths already set".to_string()));
        }

        // Validate paths exist
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {}", model_path)));
        }
        if !Path::new(tokenizer_path).exists() {
            return Err(ClassifierError::BuildError(format!("Tokenizer file not found: {}", tokenizer_path)));
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| {
                error!("Failed to load tokenizer: {}", e);
                ClassifierError::BuildError(format!("Failed to load tokenizer: {}", e))
            })?;
        info!("Tokenizer loaded from {}", tokenizer_path);

        // Create session using the singleton environment
        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(model_path)?;

        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        self.model_path = Some(model_path.to_string());
        self.tokenizer_path = Some(tokenizer_path.to_string());
        self.tokenizer = Some(tokenizer);
        self.session = Some(session);
        Ok(self)
    }

    /// Uses an already loaded label configuration.
    pub fn with_label_config(mut self, config: LabelConfig) -> Self {
        self.label_config = Some(config);
        self
    }

    /// Loads the class list, thresholds and calibration from disk.
    pub fn with_config_paths(self, paths: &ConfigPaths) -> Result<Self, ClassifierError> {
        let config = LabelConfig::load(paths)?;
        Ok(self.with_label_config(config))
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Returns
    /// * `Result<Classifier, ClassifierError>` - The constructed Classifier if successful, or an error if:
    ///   - No model and tokenizer are loaded
    ///   - No label configuration is set
    ///   - The model's output width does not match the number of classes
    pub fn build(mut self) -> Result<Classifier, ClassifierError> {
        if self.model_path.is_none() || self.tokenizer_path.is_none() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths must be set".to_string()));
        }
        let label_config = self.label_config.take()
            .ok_or_else(|| ClassifierError::BuildError("Label configuration must be set".to_string()))?;

        let max_length = self.max_length;
        let tokenizer = self.tokenizer.as_mut()
            .ok_or_else(|| ClassifierError::BuildError("No tokenizer loaded".into()))?;
        configure_tokenizer(tokenizer, max_length)?;

        // Probe the model once so a class-count mismatch fails at startup
        let logits = self.score_text(PROBE_TEXT, max_length)?;
        if logits.len() != label_config.num_classes() {
            return Err(ClassifierError::BuildError(format!(
                "Model outputs {} logits but the class list has {} labels",
                logits.len(),
                label_config.num_classes()
            )));
        }
        info!("Model output matches {} configured classes", logits.len());

        let tokenizer = Arc::new(self.tokenizer.take()
            .ok_or_else(|| ClassifierError::BuildError("No tokenizer loaded".into()))?);
        let session = Arc::new(self.session.take()
            .ok_or_else(|| ClassifierError::BuildError("No ONNX model loaded".into()))?);
        let model_path = self.model_path.take()
            .ok_or_else(|| ClassifierError::BuildError("Model path not set".into()))?;
        let tokenizer_path = self.tokenizer_path.take()
            .ok_or_else(|| ClassifierError::BuildError("Tokenizer path not set".into()))?;

        Ok(Classifier {
            model_path,
            tokenizer_path,
            tokenizer,
            session,
            labels: Arc::new(label_config),
            max_length,
        })
    }

    /// Validates that the model has the expected input/output structure
    ///
    /// # Returns
    /// * `Result<(), ClassifierError>` - Ok if validation passes, or an error if:
    ///   - The model doesn't declare `input_ids` and `attention_mask` inputs
    ///   - The model doesn't have any output tensors
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        for required in ["input_ids", "attention_mask"] {
            if !session.inputs.iter().any(|input| input.name == required) {
                return Err(ClassifierError::ModelError(format!(
                    "Model must have an '{}' input, found {:?}",
                    required,
                    session.inputs.iter().map(|input| input.name.as_str()).collect::<Vec<_>>()
                )));
            }
        }

        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for class logits".to_string()
            ));
        }

        Ok(())
    }
}
