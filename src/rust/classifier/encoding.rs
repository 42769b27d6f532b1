use std::borrow::Cow;
use std::collections::HashMap;

use log::debug;
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingStrategy, Tokenizer};

use super::error::ClassifierError;
use super::MAX_SEQUENCE_LENGTH;

/// Provides raw classifier scores for a piece of text using an ONNX sequence
/// classification model.
///
/// The process is:
/// 1. Tokenize the text with special tokens, truncated and padded to a fixed length
/// 2. Feed `input_ids`, `attention_mask` and, when the model asks for it,
///    `token_type_ids` as `[1, length]` tensors
/// 3. Read the first model output as one logit per class
pub(crate) trait SequenceScoring {
    /// Returns the initialized tokenizer if available
    fn tokenizer(&self) -> Option<&Tokenizer>;

    /// Returns the initialized ONNX session if available
    fn session(&self) -> Option<&Session>;

    /// The length the stored tokenizer is configured for
    fn configured_max_length(&self) -> usize;

    /// Tokenizes `text` to exactly `max_length` tokens.
    ///
    /// The stored tokenizer is used directly when `max_length` matches its
    /// configuration; any other length goes through a reconfigured copy.
    ///
    /// # Errors
    /// - `TokenizerError` if the tokenizer is not initialized
    /// - `ValidationError` if `max_length` is zero or above [`MAX_SEQUENCE_LENGTH`]
    /// - `TokenizerError` if the text cannot be encoded
    fn encode(&self, text: &str, max_length: usize) -> Result<Encoding, ClassifierError> {
        let tokenizer = self.tokenizer()
            .ok_or_else(|| ClassifierError::TokenizerError("Tokenizer not initialized".into()))?;

        let tokenizer = if max_length == self.configured_max_length() {
            Cow::Borrowed(tokenizer)
        } else {
            debug!("Reconfiguring tokenizer for max length {}", max_length);
            let mut copy = tokenizer.clone();
            configure_tokenizer(&mut copy, max_length)?;
            Cow::Owned(copy)
        };

        tokenizer.encode(text, true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))
    }

    /// Counts the tokens of `text` that are not padding, at the configured length.
    fn real_token_count(&self, text: &str) -> Result<usize, ClassifierError> {
        let encoding = self.encode(text, self.configured_max_length())?;
        Ok(encoding.get_attention_mask().iter().filter(|&&m| m == 1).count())
    }

    /// Tokenizes `text` and runs the model, returning one logit per class.
    fn score_text(&self, text: &str, max_length: usize) -> Result<Vec<f32>, ClassifierError> {
        let encoding = self.encode(text, max_length)?;
        self.compute_logits(&encoding)
    }

    /// Runs one forward pass over an encoding.
    ///
    /// # Model Input Format
    /// - input_ids: Token IDs [batch_size=1, sequence_length]
    /// - attention_mask: 1 for real tokens, 0 for padding [batch_size=1, sequence_length]
    /// - token_type_ids: segment IDs, only when the model declares this input
    ///
    /// # Model Output Format
    /// - Shape: [batch_size=1, num_classes]
    ///
    /// # Errors
    /// - `ModelError` if the session is not initialized
    /// - `ModelError` if the model expects an input this classifier cannot provide
    /// - `ModelError` if tensor creation, execution or output extraction fails
    fn compute_logits(&self, encoding: &Encoding) -> Result<Vec<f32>, ClassifierError> {
        let session = self.session()
            .ok_or_else(|| ClassifierError::ModelError("Session not initialized".into()))?;

        let seq_len = encoding.get_ids().len();
        let mut input_tensors = HashMap::new();
        for input in &session.inputs {
            let values = match input.name.as_str() {
                "input_ids" => encoding.get_ids(),
                "attention_mask" => encoding.get_attention_mask(),
                "token_type_ids" => encoding.get_type_ids(),
                other => {
                    return Err(ClassifierError::ModelError(format!(
                        "Unsupported model input '{}'", other
                    )))
                }
            };

            let array = Array2::from_shape_vec((1, seq_len),
                values.iter().map(|&x| x as i64).collect())
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} array: {}", input.name, e)))?;
            let tensor = Tensor::from_array(array)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} tensor: {}", input.name, e)))?;
            input_tensors.insert(input.name.as_str(), tensor);
        }

        let outputs = session.run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0].try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let shape = output_tensor.shape();
        if shape.first() != Some(&1) || shape.len() > 2 {
            return Err(ClassifierError::ModelError(format!(
                "Unexpected output shape {:?}, expected [1, num_classes]", shape
            )));
        }

        Ok(output_tensor.iter().copied().collect())
    }
}

/// Sets fixed-length padding and truncation on a tokenizer, keeping any pad
/// token and truncation strategy it already declares.
pub(crate) fn configure_tokenizer(tokenizer: &mut Tokenizer, max_length: usize) -> Result<(), ClassifierError> {
    if max_length == 0 || max_length > MAX_SEQUENCE_LENGTH {
        return Err(ClassifierError::ValidationError(format!(
            "max_length must be between 1 and {}, got {}",
            MAX_SEQUENCE_LENGTH, max_length
        )));
    }

    let mut padding = tokenizer.get_padding().cloned().unwrap_or_default();
    padding.strategy = PaddingStrategy::Fixed(max_length);
    tokenizer.with_padding(Some(padding));

    let mut truncation = tokenizer.get_truncation().cloned().unwrap_or_default();
    truncation.max_length = max_length;
    tokenizer.with_truncation(Some(truncation))
        .map_err(|e| ClassifierError::TokenizerError(format!("Failed to set truncation: {}", e)))?;

    Ok(())
}
